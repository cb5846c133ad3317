//! Serde-deserializable types matching GitHub REST API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::{Deserialize, Serialize};

use super::types::{Comment, Issue};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub login: String,
}

/// Labels come back either as bare names or as label objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiLabel {
  Name(String),
  Object { name: Option<String> },
}

impl ApiLabel {
  pub fn into_name(self) -> String {
    match self {
      ApiLabel::Name(name) => name,
      ApiLabel::Object { name } => name.unwrap_or_default(),
    }
  }
}

// ============================================================================
// Issues endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub created_at: String,
  pub html_url: String,
  pub state: String,
  #[serde(default)]
  pub labels: Vec<ApiLabel>,
  /// Present only when the "issue" is a pull request
  pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiComment {
  pub id: u64,
  pub user: Option<ApiUser>,
  pub created_at: String,
  pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiCreateIssue<'a> {
  pub title: &'a str,
  pub body: &'a str,
  #[serde(skip_serializing_if = "no_labels")]
  pub labels: &'a [String],
}

fn no_labels(labels: &&[String]) -> bool {
  labels.is_empty()
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiIssue {
  pub fn is_pull_request(&self) -> bool {
    self.pull_request.is_some()
  }

  pub fn into_issue(self) -> Issue {
    Issue {
      number: self.number,
      title: self.title,
      body: self.body,
      created_at: self.created_at,
      html_url: self.html_url,
      state: self.state,
      labels: self.labels.into_iter().map(ApiLabel::into_name).collect(),
      comments: None,
    }
  }
}

impl From<ApiComment> for Comment {
  fn from(comment: ApiComment) -> Self {
    Comment {
      id: comment.id,
      user: comment
        .user
        .map(|u| u.login)
        .unwrap_or_else(|| "unknown".to_string()),
      created_at: comment.created_at,
      body: comment.body.unwrap_or_default(),
    }
  }
}
