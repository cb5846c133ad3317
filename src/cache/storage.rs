//! Snapshot storage trait with JSON-file and SQLite implementations.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::scope::CacheScope;
use super::traits::{Cacheable, Snapshot};

/// Trait for snapshot storage backends.
///
/// One whole document per scope: reads return it if present, writes replace it.
pub trait CacheStorage: Send + Sync {
  /// Load the snapshot of `scope`, if one was saved.
  fn load<T: Cacheable>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>>;

  /// Replace the snapshot stored for `snapshot.scope`.
  fn save<T: Cacheable>(&self, snapshot: &Snapshot<T>) -> Result<()>;
}

/// Decode a stored document and check it belongs to the requested scope.
fn decode_snapshot<T: Cacheable>(scope: &CacheScope, data: &[u8]) -> Result<Snapshot<T>> {
  let snapshot: Snapshot<T> = serde_json::from_slice(data).map_err(|e| {
    eyre!(
      "Malformed {} cache for {}: {}",
      T::entity_type(),
      scope,
      e
    )
  })?;

  if !snapshot.scope.same_target(scope) {
    return Err(eyre!(
      "Cache document for {} actually belongs to {}",
      scope,
      snapshot.scope
    ));
  }

  Ok(snapshot)
}

fn encode_snapshot<T: Cacheable>(snapshot: &Snapshot<T>) -> Result<Vec<u8>> {
  serde_json::to_vec_pretty(snapshot).map_err(|e| {
    eyre!(
      "Failed to serialize {} cache for {}: {}",
      T::entity_type(),
      snapshot.scope,
      e
    )
  })
}

/// One pretty-printed JSON file per scope under a data directory.
pub struct JsonFileStorage {
  dir: PathBuf,
}

impl JsonFileStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Path of the document for `scope`.
  pub fn path_for(&self, scope: &CacheScope) -> PathBuf {
    self.dir.join(format!("{}.json", scope.storage_key()))
  }
}

impl CacheStorage for JsonFileStorage {
  fn load<T: Cacheable>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>> {
    let path = self.path_for(scope);
    if !path.exists() {
      return Ok(None);
    }

    let data = std::fs::read(&path)
      .map_err(|e| eyre!("Failed to read cache file {}: {}", path.display(), e))?;

    decode_snapshot(scope, &data).map(Some)
  }

  fn save<T: Cacheable>(&self, snapshot: &Snapshot<T>) -> Result<()> {
    std::fs::create_dir_all(&self.dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", self.dir.display(), e))?;

    let path = self.path_for(&snapshot.scope);
    let data = encode_snapshot(snapshot)?;

    // Write next to the target and rename so readers never see half a file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)
      .map_err(|e| eyre!("Failed to write cache file {}: {}", tmp.display(), e))?;
    std::fs::rename(&tmp, &path)
      .map_err(|e| eyre!("Failed to replace cache file {}: {}", path.display(), e))?;

    Ok(())
  }
}

/// SQLite-based snapshot storage: one row per scope holding the JSON document.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// In-memory database, mostly useful for tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    scope_key TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    data BLOB NOT NULL,
    record_count INTEGER NOT NULL,
    last_updated TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn load<T: Cacheable>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM snapshots WHERE scope_key = ? AND entity_type = ?",
        params![scope.storage_key(), T::entity_type()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache for {}: {}", scope, e))?;

    match data {
      Some(data) => decode_snapshot(scope, &data).map(Some),
      None => Ok(None),
    }
  }

  fn save<T: Cacheable>(&self, snapshot: &Snapshot<T>) -> Result<()> {
    let data = encode_snapshot(snapshot)?;
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshots (scope_key, kind, entity_type, data, record_count, last_updated)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
          snapshot.scope.storage_key(),
          snapshot.scope.kind(),
          T::entity_type(),
          data,
          snapshot.records.len(),
          snapshot.last_updated.to_rfc3339(),
        ],
      )
      .map_err(|e| eyre!("Failed to store cache for {}: {}", snapshot.scope, e))?;

    Ok(())
  }
}

/// Storage chosen at runtime from configuration.
pub enum StorageBackend {
  Json(JsonFileStorage),
  Sqlite(SqliteStorage),
}

impl CacheStorage for StorageBackend {
  fn load<T: Cacheable>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>> {
    match self {
      Self::Json(s) => s.load(scope),
      Self::Sqlite(s) => s.load(scope),
    }
  }

  fn save<T: Cacheable>(&self, snapshot: &Snapshot<T>) -> Result<()> {
    match self {
      Self::Json(s) => s.save(snapshot),
      Self::Sqlite(s) => s.save(snapshot),
    }
  }
}

/// Volatile storage keeping serialized documents in a map.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
  docs: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl CacheStorage for MemoryStorage {
  fn load<T: Cacheable>(&self, scope: &CacheScope) -> Result<Option<Snapshot<T>>> {
    let docs = self.docs.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match docs.get(&scope.storage_key()) {
      Some(data) => decode_snapshot(scope, data).map(Some),
      None => Ok(None),
    }
  }

  fn save<T: Cacheable>(&self, snapshot: &Snapshot<T>) -> Result<()> {
    let data = encode_snapshot(snapshot)?;
    let mut docs = self.docs.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    docs.insert(snapshot.scope.storage_key(), data);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::SortOrder;
  use chrono::{TimeZone, Utc};
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Row {
    id: u64,
    text: String,
  }

  impl Cacheable for Row {
    type Key = u64;

    fn cache_key(&self) -> u64 {
      self.id
    }

    fn entity_type() -> &'static str {
      "row"
    }

    fn sort_order() -> SortOrder {
      SortOrder::Descending
    }
  }

  fn sample(scope: CacheScope) -> Snapshot<Row> {
    Snapshot::new(
      scope,
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
      vec![Row {
        id: 7,
        text: "hello".to_string(),
      }],
    )
  }

  #[test]
  fn test_json_storage_roundtrip_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path().join("data"));
    let scope = CacheScope::repository("octo", "app");

    assert!(storage.load::<Row>(&scope).unwrap().is_none());

    storage.save(&sample(scope.clone())).unwrap();
    let loaded = storage.load::<Row>(&scope).unwrap().unwrap();

    assert_eq!(loaded.scope, scope);
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].text, "hello");
    assert_eq!(loaded.last_updated, sample(scope.clone()).last_updated);
    assert!(storage.path_for(&scope).ends_with("github-octo-app.json"));
  }

  #[test]
  fn test_json_document_layout() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let scope = CacheScope::repository("octo", "app");
    storage.save(&sample(scope.clone())).unwrap();

    let raw = std::fs::read_to_string(storage.path_for(&scope)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["kind"], "repository");
    assert_eq!(value["owner"], "octo");
    assert_eq!(value["repo"], "app");
    assert_eq!(value["lastUpdated"], "2024-05-01T12:00:00Z");
    assert_eq!(value["records"][0]["id"], 7);
  }

  #[test]
  fn test_json_storage_rejects_malformed_document() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let scope = CacheScope::channel("C1", None);
    std::fs::write(storage.path_for(&scope), "{ not json").unwrap();

    let err = storage.load::<Row>(&scope).unwrap_err();
    assert!(err.to_string().contains("Malformed row cache for C1"));
  }

  #[test]
  fn test_json_storage_rejects_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let scope = CacheScope::channel("C1", None);
    std::fs::write(
      storage.path_for(&scope),
      r#"{"kind":"channel","channelId":"C1","records":[]}"#,
    )
    .unwrap();

    assert!(storage.load::<Row>(&scope).is_err());
  }

  fn rows_of(id: u64, text: &str, scope: CacheScope) -> Snapshot<Row> {
    Snapshot::new(
      scope,
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
      vec![Row {
        id,
        text: text.to_string(),
      }],
    )
  }

  fn assert_scopes_kept_apart(storage: &impl CacheStorage) {
    let first = CacheScope::repository("my-org", "app");
    let second = CacheScope::repository("my", "org-app");
    storage.save(&rows_of(1, "from my-org/app", first.clone())).unwrap();
    storage.save(&rows_of(2, "from my/org-app", second.clone())).unwrap();

    let loaded = storage.load::<Row>(&first).unwrap().unwrap();
    assert_eq!(loaded.scope, first);
    assert_eq!(loaded.records[0].text, "from my-org/app");

    let loaded = storage.load::<Row>(&second).unwrap().unwrap();
    assert_eq!(loaded.scope, second);
    assert_eq!(loaded.records[0].text, "from my/org-app");
  }

  #[test]
  fn test_overlapping_scopes_keep_separate_documents() {
    let dir = tempfile::tempdir().unwrap();
    assert_scopes_kept_apart(&JsonFileStorage::new(dir.path()));
    assert_scopes_kept_apart(&SqliteStorage::open_in_memory().unwrap());
    assert_scopes_kept_apart(&MemoryStorage::default());
  }

  #[test]
  fn test_document_of_another_scope_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let wanted = CacheScope::repository("octo", "app");
    let other = CacheScope::repository("octo", "web");
    storage.save(&sample(other)).unwrap();
    std::fs::rename(
      storage.path_for(&CacheScope::repository("octo", "web")),
      storage.path_for(&wanted),
    )
    .unwrap();

    let err = storage.load::<Row>(&wanted).unwrap_err();
    assert!(err.to_string().contains("actually belongs to octo/web"));
  }

  #[test]
  fn test_sqlite_storage_roundtrip_and_overwrite() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let scope = CacheScope::channel("C42", Some("dev".to_string()));

    assert!(storage.load::<Row>(&scope).unwrap().is_none());

    storage.save(&sample(scope.clone())).unwrap();
    let mut snapshot = storage.load::<Row>(&scope).unwrap().unwrap();
    snapshot.records.push(Row {
      id: 8,
      text: "again".to_string(),
    });
    storage.save(&snapshot).unwrap();

    let loaded = storage.load::<Row>(&scope).unwrap().unwrap();
    assert_eq!(loaded.records.len(), 2);
    assert_eq!(loaded.scope, scope);
  }

  #[test]
  fn test_sqlite_storage_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let scope = CacheScope::repository("a", "b");

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.save(&sample(scope.clone())).unwrap();
    }

    let reopened = SqliteStorage::open(&path).unwrap();
    assert!(reopened.load::<Row>(&scope).unwrap().is_some());
  }
}
