//! Caching implementations for Slack types.

use crate::cache::{Cacheable, SortOrder, Watermark};

use super::types::{parse_ts, Message, SlackTs};

impl Cacheable for Message {
  type Key = SlackTs;

  fn cache_key(&self) -> SlackTs {
    SlackTs(self.ts.clone())
  }

  fn entity_type() -> &'static str {
    "message"
  }

  fn sort_order() -> SortOrder {
    // Chronological
    SortOrder::Ascending
  }
}

impl Watermark for Message {
  type Marker = String;

  /// Newest timestamp anywhere in the structure, replies included.
  ///
  /// A reply can be newer than every top-level message and must still move
  /// the watermark. `"0"` for an empty mirror.
  fn latest_marker(records: &[Self]) -> String {
    records
      .iter()
      .flat_map(|m| std::iter::once(m).chain(m.replies.iter().flatten()))
      .map(|m| m.ts.as_str())
      .max_by(|a, b| parse_ts(a).total_cmp(&parse_ts(b)))
      .unwrap_or("0")
      .to_string()
  }
}
