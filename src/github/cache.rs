//! Caching implementations for GitHub types.

use crate::cache::{Cacheable, SortOrder, Watermark};

use super::types::Issue;

impl Cacheable for Issue {
  type Key = u64;

  fn cache_key(&self) -> u64 {
    self.number
  }

  fn entity_type() -> &'static str {
    "issue"
  }

  fn sort_order() -> SortOrder {
    // Newest first
    SortOrder::Descending
  }
}

impl Watermark for Issue {
  type Marker = u64;

  /// Highest issue number, `0` for an empty mirror.
  fn latest_marker(records: &[Self]) -> u64 {
    records.iter().map(|issue| issue.number).max().unwrap_or(0)
  }
}
