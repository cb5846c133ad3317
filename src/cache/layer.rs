//! Cache layer that orchestrates snapshot lifecycle with network fetching.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use super::merge::merge;
use super::scope::CacheScope;
use super::storage::CacheStorage;
use super::traits::{SkipReason, Snapshot, SyncOutcome, Watermark};

/// Cache layer that manages snapshot state and network fetching.
///
/// A scope moves from "no cache" to "initialized" through a full fetch, and
/// every later update fetches only what changed since the stored watermark.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Read the current snapshot of a scope without touching the network.
  pub fn snapshot<T: Watermark>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>> {
    self.storage.load(scope)
  }

  /// Full fetch for a scope that has never been cached.
  ///
  /// Refuses (as a skip) when a snapshot already exists, so a full fetch never
  /// silently clobbers an existing mirror.
  pub async fn initialize<T, F, Fut>(&self, scope: &CacheScope, fetcher: F) -> Result<SyncOutcome>
  where
    T: Watermark,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if let Some(existing) = self.storage.load::<T>(scope)? {
      warn!(
        scope = %scope,
        records = existing.records.len(),
        last_updated = %existing.last_updated.to_rfc3339(),
        "Cache already exists, use update instead"
      );
      return Ok(SyncOutcome::Skipped(SkipReason::AlreadyCached {
        total: existing.records.len(),
        last_updated: existing.last_updated,
      }));
    }

    let records = merge(Vec::new(), fetcher().await?);
    let latest = T::latest_marker(&records).to_string();
    let total = records.len();

    self
      .storage
      .save(&Snapshot::new(scope.clone(), Utc::now(), records))?;

    info!(scope = %scope, total, latest = %latest, "Cache initialized");
    Ok(SyncOutcome::Initialized { total, latest })
  }

  /// Incremental fetch, merged into the existing snapshot.
  ///
  /// The fetcher receives the stored `lastUpdated`. The new watermark is the
  /// wall-clock time at which this fetch started, not the newest record seen.
  pub async fn update<T, F, Fut>(&self, scope: &CacheScope, fetcher: F) -> Result<SyncOutcome>
  where
    T: Watermark,
    F: FnOnce(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let Some(existing) = self.storage.load::<T>(scope)? else {
      warn!(scope = %scope, "Cache not found, run init first");
      return Ok(SyncOutcome::Skipped(SkipReason::NotCached));
    };

    info!(
      scope = %scope,
      records = existing.records.len(),
      last_updated = %existing.last_updated.to_rfc3339(),
      "Updating cache"
    );

    let started_at = Utc::now();
    let incoming = fetcher(existing.last_updated).await?;
    let fetched = incoming.len();

    let before = existing.records.len();
    let records = merge(existing.records, incoming);
    let total = records.len();
    let added = total.saturating_sub(before);
    let latest = T::latest_marker(&records).to_string();

    self
      .storage
      .save(&Snapshot::new(existing.scope, started_at, records))?;

    info!(scope = %scope, fetched, added, total, "Cache updated");
    Ok(SyncOutcome::Updated {
      fetched,
      added,
      total,
      latest,
    })
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::cache::traits::{Cacheable, SortOrder};
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::cell::Cell;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u64,
    title: String,
  }

  fn item(id: u64, title: &str) -> Item {
    Item {
      id,
      title: title.to_string(),
    }
  }

  impl Cacheable for Item {
    type Key = u64;

    fn cache_key(&self) -> u64 {
      self.id
    }

    fn entity_type() -> &'static str {
      "item"
    }

    fn sort_order() -> SortOrder {
      SortOrder::Descending
    }
  }

  impl Watermark for Item {
    type Marker = u64;

    fn latest_marker(records: &[Self]) -> u64 {
      records.iter().map(|r| r.id).max().unwrap_or(0)
    }
  }

  fn scope() -> CacheScope {
    CacheScope::repository("octo", "app")
  }

  #[tokio::test]
  async fn test_initialize_then_update() {
    let cache = CacheLayer::new(MemoryStorage::default());

    let outcome = cache
      .initialize(&scope(), || async { Ok(vec![item(1, "A")]) })
      .await
      .unwrap();
    assert_eq!(
      outcome,
      SyncOutcome::Initialized {
        total: 1,
        latest: "1".to_string()
      }
    );

    let initialized_at = cache
      .snapshot::<Item>(&scope())
      .unwrap()
      .unwrap()
      .last_updated;

    let before_update = Utc::now();
    let outcome = cache
      .update(&scope(), |since| async move {
        assert_eq!(since, initialized_at);
        Ok(vec![item(1, "B"), item(2, "C")])
      })
      .await
      .unwrap();
    assert_eq!(
      outcome,
      SyncOutcome::Updated {
        fetched: 2,
        added: 1,
        total: 2,
        latest: "2".to_string()
      }
    );

    let snapshot = cache.snapshot::<Item>(&scope()).unwrap().unwrap();
    assert_eq!(snapshot.records, vec![item(2, "C"), item(1, "B")]);
    assert!(snapshot.last_updated >= before_update);
  }

  #[tokio::test]
  async fn test_hyphenated_repositories_are_independent_scopes() {
    let cache = CacheLayer::new(MemoryStorage::default());
    let first = CacheScope::repository("my-org", "app");
    let second = CacheScope::repository("my", "org-app");

    cache
      .initialize(&first, || async { Ok(vec![item(1, "from my-org/app")]) })
      .await
      .unwrap();
    let outcome = cache
      .initialize(&second, || async { Ok(vec![item(1, "from my/org-app")]) })
      .await
      .unwrap();
    assert!(!outcome.is_skipped());

    cache
      .update(&second, |_| async { Ok(vec![item(2, "second only")]) })
      .await
      .unwrap();

    let snapshot = cache.snapshot::<Item>(&first).unwrap().unwrap();
    assert_eq!(snapshot.scope, first);
    assert_eq!(snapshot.records, vec![item(1, "from my-org/app")]);

    let snapshot = cache.snapshot::<Item>(&second).unwrap().unwrap();
    assert_eq!(snapshot.scope, second);
    assert_eq!(
      snapshot.records,
      vec![item(2, "second only"), item(1, "from my/org-app")]
    );
  }

  #[tokio::test]
  async fn test_initialize_skips_existing_cache_without_fetching() {
    let cache = CacheLayer::new(MemoryStorage::default());
    cache
      .initialize(&scope(), || async { Ok(vec![item(1, "A")]) })
      .await
      .unwrap();

    let called = Cell::new(false);
    let outcome = cache
      .initialize::<Item, _, _>(&scope(), || {
        called.set(true);
        async { Ok(vec![]) }
      })
      .await
      .unwrap();

    assert!(!called.get());
    assert!(matches!(
      outcome,
      SyncOutcome::Skipped(SkipReason::AlreadyCached { total: 1, .. })
    ));
  }

  #[tokio::test]
  async fn test_update_without_cache_is_skipped() {
    let cache = CacheLayer::new(MemoryStorage::default());

    let outcome = cache
      .update::<Item, _, _>(&scope(), |_| async { Err(eyre!("must not be called")) })
      .await
      .unwrap();

    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NotCached));
    assert!(cache.snapshot::<Item>(&scope()).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_snapshot_untouched() {
    let cache = CacheLayer::new(MemoryStorage::default());
    cache
      .initialize(&scope(), || async { Ok(vec![item(1, "A")]) })
      .await
      .unwrap();
    let before = cache.snapshot::<Item>(&scope()).unwrap().unwrap();

    let result = cache
      .update::<Item, _, _>(&scope(), |_| async { Err(eyre!("network down")) })
      .await;

    assert!(result.is_err());
    let after = cache.snapshot::<Item>(&scope()).unwrap().unwrap();
    assert_eq!(after.records, before.records);
    assert_eq!(after.last_updated, before.last_updated);
  }

  #[tokio::test]
  async fn test_empty_update_still_advances_watermark() {
    let cache = CacheLayer::new(MemoryStorage::default());
    cache
      .initialize(&scope(), || async { Ok(vec![item(3, "A")]) })
      .await
      .unwrap();
    let before = cache.snapshot::<Item>(&scope()).unwrap().unwrap();

    let outcome = cache
      .update::<Item, _, _>(&scope(), |_| async { Ok(vec![]) })
      .await
      .unwrap();

    assert_eq!(
      outcome,
      SyncOutcome::Updated {
        fetched: 0,
        added: 0,
        total: 1,
        latest: "3".to_string()
      }
    );
    let after = cache.snapshot::<Item>(&scope()).unwrap().unwrap();
    assert!(after.last_updated >= before.last_updated);
  }
}
