//! Generic snapshot cache for remote record collections.
//!
//! This module provides a source-agnostic mirroring mechanism that:
//! - Keeps one snapshot document per scope (repository or channel)
//! - Merges freshly fetched records by identity key, newest copy wins
//! - Lays out records deterministically by key
//! - Supports incremental fetching from the stored `lastUpdated` watermark

mod layer;
mod merge;
mod scope;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use merge::merge;
pub use scope::CacheScope;
pub use storage::{CacheStorage, JsonFileStorage, SqliteStorage, StorageBackend};
pub use traits::{Cacheable, SkipReason, Snapshot, SortOrder, SyncOutcome, Watermark};

#[cfg(test)]
pub use storage::MemoryStorage;
