//! src/mappers/partial_aggregator.rs
use crate::error::StoreError;
use crate::model::{Day, Event, KeyType, ShardEntry, SongId};
use crate::storage::{ShardJournal, ShardKey, ShardStore, ShardWrite};
use std::collections::{BTreeMap, HashMap};

/// Per-key song counts for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCount {
    key_type: KeyType,
    counts: HashMap<String, HashMap<SongId, u64>>,
}

impl PartialCount {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, key: &str, song_id: SongId) -> u64 {
        self.counts
            .get(key)
            .and_then(|songs| songs.get(&song_id))
            .copied()
            .unwrap_or(0)
    }

    /// Events counted for `key`.
    pub fn key_total(&self, key: &str) -> u64 {
        self.counts
            .get(key)
            .map(|songs| songs.values().sum())
            .unwrap_or(0)
    }

    pub fn key_totals(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(key, songs)| (key.clone(), songs.values().sum()))
            .collect()
    }

    /// One shard body per key, entries by ascending song id so the same chunk
    /// always encodes to the same bytes.
    pub fn into_shards(self) -> impl Iterator<Item = (String, Vec<ShardEntry>)> {
        self.counts.into_iter().map(|(key, songs)| {
            let mut entries: Vec<ShardEntry> = songs
                .into_iter()
                .map(|(song_id, count)| ShardEntry::new(song_id, count))
                .collect();
            entries.sort_unstable_by_key(|entry| entry.song_id);
            (key, entries)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub day: Day,
    pub chunk: u32,
    pub key_type: KeyType,
    pub shards_written: usize,
    pub key_totals: BTreeMap<String, u64>,
}

/// Map phase: groups a chunk of validated events by `(key, song_id)` and
/// persists one shard per key present in the chunk.
#[derive(Debug, Clone, Copy)]
pub struct PartialAggregator {
    key_type: KeyType,
}

impl PartialAggregator {
    pub fn new(key_type: KeyType) -> Self {
        PartialAggregator { key_type }
    }

    pub fn count(&self, events: &[Event]) -> PartialCount {
        let mut counts: HashMap<String, HashMap<SongId, u64>> = HashMap::new();
        for event in events {
            let key = self.key_type.key_of(event);
            if let Some(songs) = counts.get_mut(&*key) {
                *songs.entry(event.song_id).or_insert(0) += 1;
            } else {
                counts
                    .entry(key.into_owned())
                    .or_default()
                    .insert(event.song_id, 1);
            }
        }
        PartialCount {
            key_type: self.key_type,
            counts,
        }
    }

    /// Shards this call creates are recorded in `journal`. On error the caller
    /// rolls the journal back so no part of the chunk stays visible.
    pub fn write_shards(
        &self,
        store: &dyn ShardStore,
        day: Day,
        chunk: u32,
        partial: PartialCount,
        journal: &mut ShardJournal,
    ) -> Result<ChunkSummary, StoreError> {
        let key_totals = partial.key_totals();
        let mut shards_written = 0;
        for (key, entries) in partial.into_shards() {
            let shard = ShardKey::new(day, self.key_type, &key, chunk);
            if store.write_shard(&shard, &entries)? == ShardWrite::Created {
                journal.record(shard);
            }
            shards_written += 1;
        }
        Ok(ChunkSummary {
            day,
            chunk,
            key_type: self.key_type,
            shards_written,
            key_totals,
        })
    }

    #[tracing::instrument(
        name = "Aggregate chunk",
        skip(self, store, events, journal),
        fields(key_type = %self.key_type, events = events.len())
    )]
    pub fn process(
        &self,
        store: &dyn ShardStore,
        day: Day,
        chunk: u32,
        events: &[Event],
        journal: &mut ShardJournal,
    ) -> Result<ChunkSummary, StoreError> {
        let partial = self.count(events);
        let keys = partial.key_count();
        let summary = self.write_shards(store, day, chunk, partial, journal)?;
        tracing::debug!(keys, shards = summary.shards_written, "wrote chunk shards");
        Ok(summary)
    }
}
