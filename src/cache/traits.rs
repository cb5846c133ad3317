//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use super::scope::CacheScope;

/// Order in which merged records are laid out in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  /// Smallest key first (chronological for timestamps)
  Ascending,
  /// Largest key first (newest first for sequential numbers)
  Descending,
}

/// Trait for records that can be mirrored in a snapshot.
///
/// Implementors provide a unique identity key. Two records with equal keys
/// are the same remote item, and the newer copy replaces the older one whole.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Identity key, totally ordered for deterministic output
  type Key: Ord + Clone;

  /// Unique identifier for this record (e.g., issue number, message ts)
  fn cache_key(&self) -> Self::Key;

  /// Record type name for storage organization (e.g., "issue", "message")
  fn entity_type() -> &'static str;

  /// Layout of merged snapshots.
  fn sort_order() -> SortOrder;
}

/// Records that can report how far a snapshot has advanced.
pub trait Watermark: Cacheable {
  type Marker: fmt::Display;

  /// Highest marker found in `records`, or the type's zero marker when empty.
  fn latest_marker(records: &[Self]) -> Self::Marker;
}

/// A persisted mirror of one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
  #[serde(flatten)]
  pub scope: CacheScope,
  /// When the snapshot was last synchronized; next incremental fetch starts here
  pub last_updated: DateTime<Utc>,
  pub records: Vec<T>,
}

impl<T> Snapshot<T> {
  pub fn new(scope: CacheScope, last_updated: DateTime<Utc>, records: Vec<T>) -> Self {
    Self {
      scope,
      last_updated,
      records,
    }
  }
}

/// Why a synchronization step did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  /// Initialization was requested but a snapshot already exists
  AlreadyCached {
    total: usize,
    last_updated: DateTime<Utc>,
  },
  /// An update was requested before the scope was initialized
  NotCached,
}

/// Result of one synchronization step for a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  Initialized {
    total: usize,
    latest: String,
  },
  Updated {
    fetched: usize,
    added: usize,
    total: usize,
    latest: String,
  },
  Skipped(SkipReason),
}

impl SyncOutcome {
  pub fn is_skipped(&self) -> bool {
    matches!(self, SyncOutcome::Skipped(_))
  }
}

impl fmt::Display for SyncOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SyncOutcome::Initialized { total, latest } => {
        write!(f, "initialized with {} records (latest: {})", total, latest)
      }
      SyncOutcome::Updated {
        fetched,
        added,
        total,
        latest,
      } => write!(
        f,
        "fetched {}, added {}, total {} (latest: {})",
        fetched, added, total, latest
      ),
      SyncOutcome::Skipped(SkipReason::AlreadyCached {
        total,
        last_updated,
      }) => write!(
        f,
        "skipped: cache already exists ({} records, last updated {})",
        total,
        last_updated.to_rfc3339()
      ),
      SyncOutcome::Skipped(SkipReason::NotCached) => {
        write!(f, "skipped: no cache yet, run init first")
      }
    }
  }
}
