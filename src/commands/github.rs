//! `github init` / `github update`.

use color_eyre::Result;

use crate::cache::{CacheLayer, CacheScope, StorageBackend, SyncOutcome};
use crate::config::Config;
use crate::github::{GithubClient, RepoTarget};
use crate::sync::{run_each, RunSummary};

fn scope_of(target: &RepoTarget) -> CacheScope {
  CacheScope::repository(&target.owner, &target.repo)
}

/// Full fetch of every configured repository that has no cache yet.
pub async fn init(config: &Config, cache: &CacheLayer<StorageBackend>) -> Result<RunSummary> {
  let repos = config.repositories()?;
  println!("GitHub cache initialization ({} repositories)", repos.len());

  let summary = run_each(repos, |target| init_repo(config, cache, target)).await;
  println!("\n{}", summary);
  Ok(summary)
}

/// Incremental fetch for every configured repository.
pub async fn update(config: &Config, cache: &CacheLayer<StorageBackend>) -> Result<RunSummary> {
  let repos = config.repositories()?;
  println!("GitHub cache update ({} repositories)", repos.len());

  let summary = run_each(repos, |target| update_repo(config, cache, target)).await;
  println!("\n{}", summary);
  Ok(summary)
}

async fn init_repo(
  config: &Config,
  cache: &CacheLayer<StorageBackend>,
  target: RepoTarget,
) -> Result<SyncOutcome> {
  let client = GithubClient::new(config, &target)?;
  let github = &config.github;
  cache
    .initialize(&scope_of(&target), || {
      client.list_all_issues(github.include_pull_requests, github.include_comments)
    })
    .await
}

async fn update_repo(
  config: &Config,
  cache: &CacheLayer<StorageBackend>,
  target: RepoTarget,
) -> Result<SyncOutcome> {
  let client = GithubClient::new(config, &target)?;
  let github = &config.github;
  cache
    .update(&scope_of(&target), |since| {
      client.list_issues_since(since, github.include_pull_requests, github.include_comments)
    })
    .await
}
