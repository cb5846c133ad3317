//! Merge of a stored snapshot with freshly fetched records.

use std::collections::BTreeMap;

use super::traits::{Cacheable, SortOrder};

/// Reconcile `existing` with `incoming` by identity key.
///
/// An incoming record replaces the stored record with the same key entirely.
/// Later duplicates win over earlier ones on either side. The result is laid
/// out by key in the record type's sort order.
pub fn merge<T: Cacheable>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
  let mut by_key: BTreeMap<T::Key, T> = BTreeMap::new();

  for record in existing.into_iter().chain(incoming) {
    by_key.insert(record.cache_key(), record);
  }

  match T::sort_order() {
    SortOrder::Ascending => by_key.into_values().collect(),
    SortOrder::Descending => by_key.into_values().rev().collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Ticket {
    id: u32,
    title: String,
  }

  fn ticket(id: u32, title: &str) -> Ticket {
    Ticket {
      id,
      title: title.to_string(),
    }
  }

  impl Cacheable for Ticket {
    type Key = u32;

    fn cache_key(&self) -> u32 {
      self.id
    }

    fn entity_type() -> &'static str {
      "ticket"
    }

    fn sort_order() -> SortOrder {
      SortOrder::Descending
    }
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Note {
    id: u32,
  }

  impl Cacheable for Note {
    type Key = u32;

    fn cache_key(&self) -> u32 {
      self.id
    }

    fn entity_type() -> &'static str {
      "note"
    }

    fn sort_order() -> SortOrder {
      SortOrder::Ascending
    }
  }

  #[test]
  fn test_empty_incoming_reorders_existing() {
    let merged = merge(vec![ticket(1, "a"), ticket(3, "c"), ticket(2, "b")], vec![]);
    assert_eq!(merged, vec![ticket(3, "c"), ticket(2, "b"), ticket(1, "a")]);
  }

  #[test]
  fn test_empty_existing_reorders_incoming() {
    let merged = merge(vec![], vec![Note { id: 9 }, Note { id: 4 }]);
    assert_eq!(merged, vec![Note { id: 4 }, Note { id: 9 }]);
  }

  #[test]
  fn test_both_empty() {
    assert!(merge::<Ticket>(vec![], vec![]).is_empty());
  }

  #[test]
  fn test_incoming_replaces_and_inserts() {
    let merged = merge(vec![ticket(1, "A")], vec![ticket(1, "B"), ticket(2, "C")]);
    assert_eq!(merged, vec![ticket(2, "C"), ticket(1, "B")]);
  }

  #[test]
  fn test_duplicates_within_incoming_keep_last() {
    let merged = merge(vec![], vec![ticket(5, "first"), ticket(5, "second")]);
    assert_eq!(merged, vec![ticket(5, "second")]);
  }

  #[test]
  fn test_merge_is_idempotent() {
    let once = merge(vec![ticket(1, "A")], vec![ticket(2, "B")]);
    let twice = merge(once.clone(), vec![ticket(2, "B")]);
    assert_eq!(once, twice);
  }
}
