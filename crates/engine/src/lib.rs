// crates/engine/src/lib.rs
//! Batch aggregation of signal scores into the snapshot store.

pub mod aggregator;
pub mod store;

pub use aggregator::{Aggregator, AssetOutcome, RunSummary};
pub use store::{AssetUniverse, MemoryStore, PgStore, SnapshotStore};
