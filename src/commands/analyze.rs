//! `analyze`: propose issues for recent conversations not yet tracked.

use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};

use super::propose::{confirm, process_proposals, Provenance};
use super::slack::{channel_id_of, resolve_channel};
use super::target_repo;
use crate::analyzer::{format_proposals, AnalyzerClient};
use crate::cache::{CacheLayer, CacheScope, StorageBackend};
use crate::config::Config;
use crate::date_range::DateRange;
use crate::github::{format_issues, GithubClient, Issue, RepoTarget};
use crate::slack::{format_messages, Message, SlackClient};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
  pub days: u32,
  /// Restrict to one channel instead of every configured one
  pub channel: Option<String>,
  pub repo: Option<RepoTarget>,
  pub yes: bool,
}

pub async fn run(
  config: &Config,
  cache: &CacheLayer<StorageBackend>,
  options: AnalyzeOptions,
) -> Result<()> {
  let range = DateRange::last_days(options.days);
  let channels = match &options.channel {
    Some(channel) => vec![channel.clone()],
    None => config.slack.channels.clone(),
  };
  if channels.is_empty() {
    return Err(eyre!("No Slack channel given (--channel) or configured (slack.channels)"));
  }

  let slack = SlackClient::new(config)?;
  let mut messages = Vec::new();
  for channel in &channels {
    let scope = resolve_channel(&slack, channel).await?;
    let found = channel_messages(&slack, cache, &scope, &range).await?;
    println!("{}: {} messages", scope, found.len());
    messages.extend(found);
  }

  if messages.is_empty() {
    println!("No messages found in the last {} days.", options.days);
    return Ok(());
  }

  let target = target_repo(config, options.repo)?;
  let github = GithubClient::new(config, &target)?;
  let issues = repository_issues(&github, cache, &range).await?;
  println!("{}: {} existing issues", target, issues.len());

  let analyzer = AnalyzerClient::new(config)?;
  let proposals = analyzer
    .analyze_conversations(&format_messages(&messages), &format_issues(&issues))
    .await?;
  println!("{}", format_proposals(&proposals));

  if proposals.is_empty() {
    return Ok(());
  }
  let auto_yes = options.yes;
  process_proposals(&proposals, &github, Provenance::Slack, |_| confirm(auto_yes)).await?;
  Ok(())
}

/// Messages of a channel inside `range`: from the cache when initialized, else live.
async fn channel_messages(
  slack: &SlackClient,
  cache: &CacheLayer<StorageBackend>,
  scope: &CacheScope,
  range: &DateRange,
) -> Result<Vec<Message>> {
  match cache.snapshot::<Message>(scope)? {
    Some(snapshot) => {
      info!(scope = %scope, "Using cached messages");
      Ok(within(snapshot.records, range))
    }
    None => {
      warn!(scope = %scope, "No message cache, fetching live");
      slack.messages_in_range(channel_id_of(scope)?, range).await
    }
  }
}

/// Issues of the target repository: the whole cached mirror, else recent ones live.
async fn repository_issues(
  github: &GithubClient,
  cache: &CacheLayer<StorageBackend>,
  range: &DateRange,
) -> Result<Vec<Issue>> {
  let target = github.target();
  let scope = CacheScope::repository(&target.owner, &target.repo);
  match cache.snapshot::<Issue>(&scope)? {
    Some(snapshot) => {
      info!(scope = %scope, "Using cached issues");
      Ok(snapshot.records)
    }
    None => {
      warn!(scope = %scope, "No issue cache, fetching issues in range live");
      github.list_issues_in_range(range).await
    }
  }
}

/// Top-level messages posted inside `range`, replies kept with their parent.
fn within(messages: Vec<Message>, range: &DateRange) -> Vec<Message> {
  messages
    .into_iter()
    .filter(|m| m.posted_at().is_some_and(|at| range.contains(at)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn msg(ts: &str) -> Message {
    Message {
      ts: ts.to_string(),
      user: Some("U1".to_string()),
      text: "hi".to_string(),
      thread_ts: None,
      reply_count: None,
      replies: None,
    }
  }

  #[test]
  fn test_within_keeps_range_only() {
    let range = DateRange::new(
      Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
      Utc.timestamp_opt(1_700_086_400, 0).unwrap(),
    );
    let kept = within(
      vec![
        msg("1699999999.000100"),
        msg("1700000000.000000"),
        msg("1700050000.123456"),
        msg("1700086401.000000"),
        msg("not-a-ts"),
      ],
      &range,
    );

    let stamps: Vec<&str> = kept.iter().map(|m| m.ts.as_str()).collect();
    assert_eq!(stamps, vec!["1700000000.000000", "1700050000.123456"]);
  }

  #[tokio::test]
  async fn test_cached_issues_are_preferred() {
    use crate::cache::{CacheStorage, JsonFileStorage, Snapshot};

    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let scope = CacheScope::repository("o", "r");
    let issue = Issue {
      number: 1,
      title: "Cached".to_string(),
      body: None,
      created_at: "2020-01-01T00:00:00Z".to_string(),
      html_url: "https://github.com/o/r/issues/1".to_string(),
      state: "open".to_string(),
      labels: vec![],
      comments: None,
    };
    storage
      .save(&Snapshot::new(scope, Utc::now(), vec![issue]))
      .unwrap();

    let cache = CacheLayer::new(StorageBackend::Json(storage));
    // Unroutable base: any network call would fail the test
    let github =
      GithubClient::with_token("http://127.0.0.1:9", "t", RepoTarget::new("o", "r")).unwrap();

    let issues = repository_issues(&github, &cache, &DateRange::last_days(7))
      .await
      .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "Cached");
  }
}
