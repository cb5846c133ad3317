//! Serde-deserializable types matching Slack Web API responses.

use serde::Deserialize;
use std::fmt;

use super::types::Message;

/// Every Slack response carries `ok` and, when false, an `error` code.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  pub ok: bool,
  pub error: Option<String>,
  #[serde(flatten)]
  pub data: T,
}

impl<T> ApiResponse<T> {
  /// Split into the payload or the Slack error code.
  pub fn into_result(self, method: &'static str) -> Result<T, SlackApiError> {
    if self.ok {
      Ok(self.data)
    } else {
      Err(SlackApiError {
        method,
        code: self.error.unwrap_or_else(|| "unknown_error".to_string()),
      })
    }
  }
}

/// An `ok: false` answer from the Slack API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackApiError {
  pub method: &'static str,
  pub code: String,
}

impl fmt::Display for SlackApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Slack {} failed: {}", self.method, self.code)
  }
}

impl std::error::Error for SlackApiError {}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMetadata {
  #[serde(default)]
  pub next_cursor: Option<String>,
}

/// Cursor for the next page, if there is one.
pub fn next_cursor(metadata: Option<ResponseMetadata>) -> Option<String> {
  metadata
    .and_then(|m| m.next_cursor)
    .filter(|cursor| !cursor.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct ApiChannel {
  pub id: String,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelsPage {
  #[serde(default)]
  pub channels: Vec<ApiChannel>,
  pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesPage {
  #[serde(default)]
  pub messages: Vec<Message>,
  pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Empty {}
