//! src/test_utils.rs
use crate::model::{Day, ShardEntry};
use std::path::PathBuf;

pub fn test_data_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("data");
    path
}

/// A fresh `/tmp/topcharts/<uuid>` directory. Callers remove it when done.
pub fn scratch_dir() -> PathBuf {
    let path = PathBuf::from(format!("/tmp/topcharts/{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&path).expect("Failed to create test directory");
    path
}

pub fn day(stamp: &str) -> Day {
    Day::parse(stamp).expect("Failed to parse day")
}

pub fn entries(pairs: &[(u64, u64)]) -> Vec<ShardEntry> {
    pairs
        .iter()
        .map(|&(song_id, count)| ShardEntry::new(song_id, count))
        .collect()
}
