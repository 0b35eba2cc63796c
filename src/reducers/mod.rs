//! src/reducers/mod.rs
mod accumulator;
pub use accumulator::{MergeAccumulator, RankedEntry};

mod window_merger;
pub use window_merger::WindowMerger;
