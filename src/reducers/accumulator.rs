//! src/reducers/accumulator.rs
use crate::model::{ShardEntry, SongId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A song's total over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankedEntry {
    pub song_id: SongId,
    pub total_count: u64,
}

impl RankedEntry {
    pub fn new(song_id: SongId, total_count: u64) -> Self {
        RankedEntry {
            song_id,
            total_count,
        }
    }
}

/// Highest count first; equal counts by ascending song id.
impl Ord for RankedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total_count
            .cmp(&self.total_count)
            .then_with(|| self.song_id.cmp(&other.song_id))
    }
}

impl PartialOrd for RankedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.song_id, self.total_count)
    }
}

/// Running per-song sums for a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeAccumulator {
    totals: HashMap<SongId, u64>,
}

impl MergeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, entries: &[ShardEntry]) {
        for entry in entries {
            let total = self.totals.entry(entry.song_id).or_insert(0);
            *total = total.saturating_add(entry.count);
        }
    }

    pub fn absorb(&mut self, other: MergeAccumulator) {
        for (song_id, count) in other.totals {
            let total = self.totals.entry(song_id).or_insert(0);
            *total = total.saturating_add(count);
        }
    }

    pub fn get(&self, song_id: SongId) -> u64 {
        self.totals.get(&song_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// The `k` best entries in rank order; shorter when fewer songs were seen.
    pub fn top_k(&self, k: usize) -> Vec<RankedEntry> {
        if k == 0 {
            return vec![];
        }
        let mut ranked: Vec<RankedEntry> = self
            .totals
            .iter()
            .map(|(&song_id, &total)| RankedEntry::new(song_id, total))
            .collect();
        if ranked.len() > k {
            ranked.select_nth_unstable(k - 1);
            ranked.truncate(k);
        }
        ranked.sort_unstable();
        ranked
    }
}
