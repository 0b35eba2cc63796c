//! src/mappers/mod.rs
mod partial_aggregator;
pub use partial_aggregator::{ChunkSummary, PartialAggregator, PartialCount};
