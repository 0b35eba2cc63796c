//! src/storage/memory.rs
use crate::error::StoreError;
use crate::model::{Day, KeyType, ShardEntry};
use crate::storage::{check_key, decode_shard, encode_shard, ShardKey, ShardStore, ShardWrite};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

type KeySlot = (Day, KeyType, String);

/// In-process shard store. Shards are kept in their encoded text form.
#[derive(Debug, Default)]
pub struct MemoryShardStore {
    shards: Mutex<BTreeMap<KeySlot, BTreeMap<u32, String>>>,
}

impl MemoryShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` verbatim, replacing anything at `shard`.
    pub fn insert_raw(&self, shard: &ShardKey, contents: &str) {
        self.lock()
            .entry((shard.day, shard.key_type, shard.key.clone()))
            .or_default()
            .insert(shard.chunk, contents.to_string());
    }

    pub fn shard_count(&self) -> usize {
        self.lock().values().map(BTreeMap::len).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<KeySlot, BTreeMap<u32, String>>> {
        self.shards.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn location(shard: &ShardKey) -> String {
        format!(
            "memory://listen-{}/{}/{}/{}",
            shard.day.stamp(),
            shard.key_type.dir_name(),
            shard.key,
            shard.file_name()
        )
    }
}

impl ShardStore for MemoryShardStore {
    fn list_keys(&self, day: Day, key_type: KeyType) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .keys()
            .filter(|(d, kt, _)| *d == day && *kt == key_type)
            .map(|(_, _, key)| key.clone())
            .collect())
    }

    fn list_shards(
        &self,
        day: Day,
        key_type: KeyType,
        key: &str,
    ) -> Result<Vec<ShardKey>, StoreError> {
        Ok(self
            .lock()
            .get(&(day, key_type, key.to_string()))
            .map(|chunks| {
                chunks
                    .keys()
                    .map(|&chunk| ShardKey::new(day, key_type, key, chunk))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn read_shard(&self, shard: &ShardKey) -> Result<Vec<ShardEntry>, StoreError> {
        let location = Self::location(shard);
        let text = self
            .lock()
            .get(&(shard.day, shard.key_type, shard.key.clone()))
            .and_then(|chunks| chunks.get(&shard.chunk))
            .cloned()
            .ok_or_else(|| {
                StoreError::io(
                    &location,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such shard"),
                )
            })?;
        decode_shard(&location, &text)
    }

    fn write_shard(
        &self,
        shard: &ShardKey,
        entries: &[ShardEntry],
    ) -> Result<ShardWrite, StoreError> {
        check_key(&shard.key)?;
        let body = encode_shard(entries);
        let mut shards = self.lock();
        let chunks = shards
            .entry((shard.day, shard.key_type, shard.key.clone()))
            .or_default();
        match chunks.get(&shard.chunk) {
            Some(stored) if *stored == body => Ok(ShardWrite::Unchanged),
            Some(_) => Err(StoreError::ShardExists {
                location: Self::location(shard),
            }),
            None => {
                chunks.insert(shard.chunk, body);
                Ok(ShardWrite::Created)
            }
        }
    }

    fn remove_shard(&self, shard: &ShardKey) -> Result<(), StoreError> {
        let mut shards = self.lock();
        let slot = (shard.day, shard.key_type, shard.key.clone());
        if let Some(chunks) = shards.get_mut(&slot) {
            chunks.remove(&shard.chunk);
            if chunks.is_empty() {
                shards.remove(&slot);
            }
        }
        Ok(())
    }
}
