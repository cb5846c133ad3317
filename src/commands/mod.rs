//! Subcommand implementations.

pub mod analyze;
pub mod github;
pub mod markdown;
pub mod propose;
pub mod slack;

use color_eyre::{eyre::eyre, Result};

use crate::cache::{CacheLayer, JsonFileStorage, SqliteStorage, StorageBackend};
use crate::config::{Config, StorageConfig, StorageKind};
use crate::github::RepoTarget;

/// Open the configured snapshot store.
pub fn open_cache(storage: &StorageConfig) -> Result<CacheLayer<StorageBackend>> {
  let backend = match storage.backend {
    StorageKind::Json => StorageBackend::Json(JsonFileStorage::new(&storage.data_dir)),
    StorageKind::Sqlite => {
      StorageBackend::Sqlite(SqliteStorage::open(&storage.data_dir.join("cache.db"))?)
    }
  };
  Ok(CacheLayer::new(backend))
}

/// Repository new issues are created in: the explicit one, else the first configured.
pub fn target_repo(config: &Config, explicit: Option<RepoTarget>) -> Result<RepoTarget> {
  if let Some(target) = explicit {
    return Ok(target);
  }
  config
    .repositories()?
    .into_iter()
    .next()
    .ok_or_else(|| eyre!("No repository configured"))
}
