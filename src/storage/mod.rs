//! src/storage/mod.rs
use crate::error::StoreError;
use crate::model::{Day, KeyType, ShardEntry};
use std::fmt::Write;

mod fs;
pub(crate) use fs::write_new_file;
pub use fs::FsShardStore;

mod memory;
pub use memory::MemoryShardStore;

/// Coordinate of one shard: one key's partial counts for one chunk of one day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardKey {
    pub day: Day,
    pub key_type: KeyType,
    pub key: String,
    pub chunk: u32,
}

impl ShardKey {
    pub fn new(day: Day, key_type: KeyType, key: &str, chunk: u32) -> Self {
        ShardKey {
            day,
            key_type,
            key: key.to_string(),
            chunk,
        }
    }

    /// `top-{YYYYMMDD}-{tag}-{chunk}.csv`
    pub fn file_name(&self) -> String {
        format!(
            "top-{}-{}-{}.csv",
            self.day.stamp(),
            self.key_type.shard_tag(),
            self.chunk
        )
    }

    pub fn parse_file_name(day: Day, key_type: KeyType, key: &str, name: &str) -> Option<Self> {
        let prefix = format!("top-{}-{}-", day.stamp(), key_type.shard_tag());
        let chunk = name.strip_prefix(&prefix)?.strip_suffix(".csv")?;
        if chunk.is_empty() || !chunk.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        chunk
            .parse()
            .ok()
            .map(|chunk| ShardKey::new(day, key_type, key, chunk))
    }
}

/// Outcome of [`ShardStore::write_shard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardWrite {
    Created,
    /// The shard was already stored with the same contents.
    Unchanged,
}

/// Addressable storage for shards. Absence of a key on a day is an empty
/// listing, never an error. Shards are write-once.
pub trait ShardStore: Send + Sync {
    /// Keys with a shard directory for `day`, sorted.
    fn list_keys(&self, day: Day, key_type: KeyType) -> Result<Vec<String>, StoreError>;

    /// Shards stored for `key` on `day`, sorted by chunk.
    fn list_shards(
        &self,
        day: Day,
        key_type: KeyType,
        key: &str,
    ) -> Result<Vec<ShardKey>, StoreError>;

    fn read_shard(&self, shard: &ShardKey) -> Result<Vec<ShardEntry>, StoreError>;

    /// Rewriting identical contents is [`ShardWrite::Unchanged`]. Different
    /// contents fail with [`StoreError::ShardExists`] and leave the stored shard as is.
    fn write_shard(&self, shard: &ShardKey, entries: &[ShardEntry])
        -> Result<ShardWrite, StoreError>;

    /// Removing a shard that isn't stored is a no-op.
    fn remove_shard(&self, shard: &ShardKey) -> Result<(), StoreError>;
}

/// The shards one map chunk created, so a failed chunk can be taken back out
/// of the store as a whole.
#[derive(Debug, Default)]
pub struct ShardJournal {
    created: Vec<ShardKey>,
}

impl ShardJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, shard: ShardKey) {
        self.created.push(shard);
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Removes every recorded shard. Returns how many could not be removed.
    pub fn roll_back(self, store: &dyn ShardStore) -> usize {
        let mut stuck = 0;
        for shard in self.created.iter().rev() {
            if let Err(e) = store.remove_shard(shard) {
                tracing::error!(error = %e, key = %shard.key, chunk = shard.chunk, "failed to roll back shard");
                stuck += 1;
            }
        }
        tracing::warn!(
            removed = self.created.len() - stuck,
            stuck,
            "rolled back chunk shards"
        );
        stuck
    }
}

/// Key values double as directory names.
pub fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

pub fn encode_shard(entries: &[ShardEntry]) -> String {
    let mut out = String::with_capacity(entries.len() * 12);
    for entry in entries {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}|{}", entry.song_id, entry.count);
    }
    out
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

pub fn decode_shard(location: &str, text: &str) -> Result<Vec<ShardEntry>, StoreError> {
    let corrupt = |line: usize, reason: &str| StoreError::CorruptShard {
        location: location.to_string(),
        line,
        reason: reason.to_string(),
    };
    let mut entries = vec![];
    for (i, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (song_id, count) = line
            .split_once('|')
            .ok_or_else(|| corrupt(i + 1, "expected 'song_id|count'"))?;
        let song_id = parse_digits(song_id)
            .ok_or_else(|| corrupt(i + 1, "song_id is not a non-negative integer"))?;
        let count = parse_digits(count)
            .ok_or_else(|| corrupt(i + 1, "count is not a non-negative integer"))?;
        entries.push(ShardEntry::new(song_id, count));
    }
    Ok(entries)
}
