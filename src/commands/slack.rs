//! `slack init` / `slack update`.

use color_eyre::{eyre::eyre, Result};

use crate::cache::{CacheLayer, CacheScope, StorageBackend, SyncOutcome};
use crate::config::Config;
use crate::date_range::DateRange;
use crate::slack::SlackClient;
use crate::sync::{run_each, RunSummary};

/// Resolve a configured channel into its cache scope.
///
/// Names are looked up through the API; values that already look like
/// channel ids are accepted as-is when no channel of that name exists.
pub async fn resolve_channel(client: &SlackClient, channel: &str) -> Result<CacheScope> {
  let name = channel.trim().trim_start_matches('#');
  if let Some(id) = client.channel_id_by_name(name).await? {
    return Ok(CacheScope::channel(id, Some(name.to_string())));
  }
  if looks_like_channel_id(name) {
    return Ok(CacheScope::channel(name, None));
  }
  Err(eyre!("Channel not found: {}", channel))
}

fn looks_like_channel_id(value: &str) -> bool {
  value.len() >= 9
    && matches!(value.chars().next(), Some('C' | 'G'))
    && value
      .chars()
      .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn configured_channels(config: &Config) -> Result<Vec<String>> {
  if config.slack.channels.is_empty() {
    return Err(eyre!("No Slack channels configured (slack.channels)"));
  }
  Ok(config.slack.channels.clone())
}

/// Fetch the last `days` (default `slack.initial_days`) of every configured channel.
pub async fn init(
  config: &Config,
  cache: &CacheLayer<StorageBackend>,
  days: Option<u32>,
) -> Result<RunSummary> {
  let channels = configured_channels(config)?;
  let client = SlackClient::new(config)?;
  let days = days.unwrap_or(config.slack.initial_days);
  println!(
    "Slack cache initialization ({} channels, last {} days)",
    channels.len(),
    days
  );

  let summary = run_each(channels, |channel| {
    init_channel(&client, cache, channel, DateRange::last_days(days))
  })
  .await;
  println!("\n{}", summary);
  Ok(summary)
}

/// Fetch every configured channel from its stored watermark up to now.
pub async fn update(config: &Config, cache: &CacheLayer<StorageBackend>) -> Result<RunSummary> {
  let channels = configured_channels(config)?;
  let client = SlackClient::new(config)?;
  println!("Slack cache update ({} channels)", channels.len());

  let summary = run_each(channels, |channel| update_channel(&client, cache, channel)).await;
  println!("\n{}", summary);
  Ok(summary)
}

async fn init_channel(
  client: &SlackClient,
  cache: &CacheLayer<StorageBackend>,
  channel: String,
  range: DateRange,
) -> Result<SyncOutcome> {
  let scope = resolve_channel(client, &channel).await?;
  let channel_id = channel_id_of(&scope)?;
  cache
    .initialize(&scope, || client.messages_in_range(channel_id, &range))
    .await
}

async fn update_channel(
  client: &SlackClient,
  cache: &CacheLayer<StorageBackend>,
  channel: String,
) -> Result<SyncOutcome> {
  let scope = resolve_channel(client, &channel).await?;
  let channel_id = channel_id_of(&scope)?;
  cache
    .update(&scope, |since| async move {
      client
        .messages_in_range(channel_id, &DateRange::since(since))
        .await
    })
    .await
}

pub(crate) fn channel_id_of(scope: &CacheScope) -> Result<&str> {
  match scope {
    CacheScope::Channel { channel_id, .. } => Ok(channel_id),
    other => Err(eyre!("{} is not a Slack channel", other)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[test]
  fn test_channel_id_shape() {
    assert!(looks_like_channel_id("C0123ABCD"));
    assert!(looks_like_channel_id("G0123ABCD9"));
    assert!(!looks_like_channel_id("general"));
    assert!(!looks_like_channel_id("C012"));
    assert!(!looks_like_channel_id("c0123abcd"));
  }

  #[tokio::test]
  async fn test_resolve_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/conversations.list"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "channels": [{ "id": "C0000DEV1", "name": "dev" }]
      })))
      .mount(&server)
      .await;

    let client = SlackClient::with_token(&server.uri(), "xoxb-test").unwrap();

    let scope = resolve_channel(&client, "#dev").await.unwrap();
    assert_eq!(scope, CacheScope::channel("C0000DEV1", Some("dev".to_string())));

    let scope = resolve_channel(&client, "C0000OPS2").await.unwrap();
    assert_eq!(scope, CacheScope::channel("C0000OPS2", None));

    let err = resolve_channel(&client, "random").await.unwrap_err();
    assert!(err.to_string().contains("Channel not found"));
  }
}
