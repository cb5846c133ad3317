use crate::config::Config;
use crate::date_range::DateRange;
use crate::http::{base_url, read_json};
use crate::slack::api_types::{
  next_cursor, ApiResponse, ChannelsPage, Empty, MessagesPage, SlackApiError,
};
use crate::slack::types::Message;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};
use url::Url;

/// Outcome of asking to join a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
  Joined,
  AlreadyMember,
  /// The bot cannot join by itself; carries the Slack error code
  Refused(String),
}

impl JoinOutcome {
  pub fn is_member(&self) -> bool {
    matches!(self, JoinOutcome::Joined | JoinOutcome::AlreadyMember)
  }
}

/// Slack Web API client wrapper
#[derive(Clone)]
pub struct SlackClient {
  http: reqwest::Client,
  base: Url,
}

impl SlackClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::slack_token()?;
    Self::with_token(&config.slack.api_url, &token)
  }

  pub fn with_token(api_url: &str, token: &str) -> Result<Self> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| eyre!("Invalid Slack token: {}", e))?;
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create Slack client: {}", e))?;

    Ok(Self {
      http,
      base: base_url(api_url)?,
    })
  }

  /// Look up a channel id by name (a leading '#' is ignored)
  pub async fn channel_id_by_name(&self, name: &str) -> Result<Option<String>> {
    let wanted = name.trim_start_matches('#');
    let mut cursor: Option<String> = None;

    loop {
      let mut query = vec![
        ("types", "public_channel,private_channel".to_string()),
        ("limit", "200".to_string()),
      ];
      if let Some(c) = &cursor {
        query.push(("cursor", c.clone()));
      }

      let page: ChannelsPage = self.get("conversations.list", &query).await?;
      if let Some(channel) = page.channels.iter().find(|ch| ch.name == wanted) {
        return Ok(Some(channel.id.clone()));
      }

      cursor = next_cursor(page.response_metadata);
      if cursor.is_none() {
        return Ok(None);
      }
    }
  }

  /// Ask Slack to add the bot to a channel.
  ///
  /// Being a member already counts as success. Archived channels, private
  /// channels and any other failure are refused rather than raised.
  pub async fn join_channel(&self, channel_id: &str) -> Result<JoinOutcome> {
    let result = self
      .post::<Empty>("conversations.join", &[("channel", channel_id)])
      .await;

    let outcome = match result {
      Ok(_) => JoinOutcome::Joined,
      Err(e) => match e.downcast_ref::<SlackApiError>() {
        Some(api) if api.code == "already_in_channel" => JoinOutcome::AlreadyMember,
        Some(api) => JoinOutcome::Refused(api.code.clone()),
        None => JoinOutcome::Refused(e.to_string()),
      },
    };

    match &outcome {
      JoinOutcome::Joined => info!(channel = channel_id, "Joined channel"),
      JoinOutcome::AlreadyMember => info!(channel = channel_id, "Already in channel"),
      JoinOutcome::Refused(code) if code == "is_archived" => {
        error!(channel = channel_id, "Cannot join: channel is archived")
      }
      JoinOutcome::Refused(code) if code == "method_not_supported_for_channel_type" => error!(
        channel = channel_id,
        "Cannot join: private channel, invite the bot manually"
      ),
      JoinOutcome::Refused(code) => error!(channel = channel_id, "Cannot join: {}", code),
    }

    Ok(outcome)
  }

  /// Top-level messages in a time range, across all cursor pages
  pub async fn history(&self, channel_id: &str, range: &DateRange) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
      let mut query = vec![
        ("channel", channel_id.to_string()),
        ("oldest", range.oldest_ts()),
        ("latest", range.latest_ts()),
        ("limit", "100".to_string()),
      ];
      if let Some(c) = &cursor {
        query.push(("cursor", c.clone()));
      }

      let page: MessagesPage = self.get("conversations.history", &query).await?;
      messages.extend(page.messages);

      cursor = next_cursor(page.response_metadata);
      if cursor.is_none() {
        break;
      }
    }

    Ok(messages)
  }

  /// Replies of one thread inside the range, without the parent message.
  ///
  /// Failures are logged and yield no replies.
  pub async fn thread_replies(
    &self,
    channel_id: &str,
    thread_ts: &str,
    range: &DateRange,
  ) -> Vec<Message> {
    let query = vec![
      ("channel", channel_id.to_string()),
      ("ts", thread_ts.to_string()),
      ("oldest", range.oldest_ts()),
      ("latest", range.latest_ts()),
    ];

    match self.get::<MessagesPage>("conversations.replies", &query).await {
      Ok(page) => page.messages.into_iter().skip(1).collect(),
      Err(e) => {
        warn!(channel = channel_id, thread = thread_ts, "Failed to fetch thread replies: {}", e);
        Vec::new()
      }
    }
  }

  /// History plus thread replies for a range.
  ///
  /// When the bot is not in the channel it tries to join once and retries.
  pub async fn messages_in_range(
    &self,
    channel_id: &str,
    range: &DateRange,
  ) -> Result<Vec<Message>> {
    info!(
      channel = channel_id,
      oldest = %range.oldest_ts(),
      latest = %range.latest_ts(),
      "Fetching messages"
    );

    let mut messages = match self.history(channel_id, range).await {
      Ok(messages) => messages,
      Err(e) if is_api_error(&e, "not_in_channel") => {
        warn!(channel = channel_id, "Bot is not in the channel, attempting to join");
        let outcome = self.join_channel(channel_id).await?;
        if !outcome.is_member() {
          return Err(e.wrap_err(format!(
            "Could not join channel {}; invite the bot with /invite",
            channel_id
          )));
        }
        self.history(channel_id, range).await?
      }
      Err(e) => return Err(e),
    };
    info!(channel = channel_id, count = messages.len(), "Fetched main messages");

    let mut reply_count = 0usize;
    for message in messages.iter_mut().filter(|m| m.has_replies()) {
      let thread_ts = message.thread_ts.clone().unwrap_or_else(|| message.ts.clone());
      let replies = self.thread_replies(channel_id, &thread_ts, range).await;
      reply_count += replies.len();
      message.replies = Some(replies);
    }
    info!(channel = channel_id, replies = reply_count, "Fetched thread replies");

    Ok(messages)
  }

  fn endpoint(&self, api_method: &str) -> Result<Url> {
    self
      .base
      .join(api_method)
      .map_err(|e| eyre!("Invalid Slack endpoint {}: {}", api_method, e))
  }

  async fn get<T: DeserializeOwned>(
    &self,
    api_method: &'static str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let response = self
      .http
      .get(self.endpoint(api_method)?)
      .query(query)
      .send()
      .await
      .map_err(|e| eyre!("Slack request to {} failed: {}", api_method, e))?;

    let body: ApiResponse<T> = read_json(response, "Slack", api_method).await?;
    Ok(body.into_result(api_method)?)
  }

  async fn post<T: DeserializeOwned>(
    &self,
    api_method: &'static str,
    form: &[(&str, &str)],
  ) -> Result<T> {
    let response = self
      .http
      .post(self.endpoint(api_method)?)
      .form(form)
      .send()
      .await
      .map_err(|e| eyre!("Slack request to {} failed: {}", api_method, e))?;

    let body: ApiResponse<T> = read_json(response, "Slack", api_method).await?;
    Ok(body.into_result(api_method)?)
  }
}

fn is_api_error(err: &color_eyre::Report, code: &str) -> bool {
  err
    .downcast_ref::<SlackApiError>()
    .is_some_and(|api| api.code == code)
}
