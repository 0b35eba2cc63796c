//! src/reducers/window_merger.rs
use crate::error::StoreError;
use crate::keys::KeyUniverse;
use crate::model::{Day, KeyType};
use crate::output::OutputRow;
use crate::reducers::MergeAccumulator;
use crate::storage::ShardStore;

/// Reduce phase: merges every shard of a key over the trailing window ending
/// at a target day and keeps the top `top_k` songs.
#[derive(Debug, Clone, Copy)]
pub struct WindowMerger {
    key_type: KeyType,
    window_days: u32,
    top_k: usize,
}

impl WindowMerger {
    pub fn new(key_type: KeyType, window_days: u32, top_k: usize) -> Self {
        WindowMerger {
            key_type,
            window_days,
            top_k,
        }
    }

    /// `target - (window_days - 1) ..= target`
    pub fn window(&self, target: Day) -> Vec<Day> {
        target.window(self.window_days)
    }

    pub fn candidate_keys(
        &self,
        store: &dyn ShardStore,
        target: Day,
        universe: &KeyUniverse,
    ) -> Result<Vec<String>, StoreError> {
        universe.resolve(store, self.key_type, &self.window(target))
    }

    /// `None` when no shard for `key` exists anywhere in the window.
    pub fn merge_key(
        &self,
        store: &dyn ShardStore,
        target: Day,
        key: &str,
    ) -> Result<Option<MergeAccumulator>, StoreError> {
        let mut accumulator: Option<MergeAccumulator> = None;
        for day in self.window(target) {
            for shard in store.list_shards(day, self.key_type, key)? {
                let entries = store.read_shard(&shard)?;
                accumulator
                    .get_or_insert_with(MergeAccumulator::new)
                    .fold(&entries);
            }
        }
        Ok(accumulator)
    }

    pub fn rank_key(
        &self,
        store: &dyn ShardStore,
        target: Day,
        key: &str,
    ) -> Result<Option<OutputRow>, StoreError> {
        Ok(self
            .merge_key(store, target, key)?
            .filter(|accumulator| !accumulator.is_empty())
            .map(|accumulator| OutputRow::new(key, accumulator.top_k(self.top_k))))
    }

    /// One row per key with activity in the window, in universe order.
    #[tracing::instrument(name = "Merge window", skip(self, store, universe), fields(key_type = %self.key_type))]
    pub fn run(
        &self,
        store: &dyn ShardStore,
        target: Day,
        universe: &KeyUniverse,
    ) -> Result<Vec<OutputRow>, StoreError> {
        let mut rows = vec![];
        for key in self.candidate_keys(store, target, universe)? {
            if let Some(row) = self.rank_key(store, target, &key)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}
