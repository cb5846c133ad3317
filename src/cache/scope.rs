//! Identity of a tracked scope (a repository or a channel).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently mirrored collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CacheScope {
  /// Issues of a GitHub repository
  #[serde(rename_all = "camelCase")]
  Repository { owner: String, repo: String },
  /// Messages of a Slack channel
  #[serde(rename_all = "camelCase")]
  Channel {
    channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel_name: Option<String>,
  },
}

impl CacheScope {
  pub fn repository(owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self::Repository {
      owner: owner.into(),
      repo: repo.into(),
    }
  }

  pub fn channel(channel_id: impl Into<String>, channel_name: Option<String>) -> Self {
    Self::Channel {
      channel_id: channel_id.into(),
      channel_name,
    }
  }

  /// Stable document key, also usable as a file stem.
  ///
  /// Components are escaped so that '-' only ever separates them and two
  /// scopes never share a key. The channel name is display-only and does not
  /// take part in the key.
  pub fn storage_key(&self) -> String {
    match self {
      Self::Repository { owner, repo } => format!("github-{}-{}", escape(owner), escape(repo)),
      Self::Channel { channel_id, .. } => format!("slack-{}", escape(channel_id)),
    }
  }

  /// Whether both scopes name the same remote collection.
  pub fn same_target(&self, other: &CacheScope) -> bool {
    match (self, other) {
      (
        Self::Repository { owner, repo },
        Self::Repository {
          owner: other_owner,
          repo: other_repo,
        },
      ) => owner == other_owner && repo == other_repo,
      (
        Self::Channel { channel_id, .. },
        Self::Channel {
          channel_id: other_id,
          ..
        },
      ) => channel_id == other_id,
      _ => false,
    }
  }

  /// Storage kind, used to keep document families apart.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Repository { .. } => "repository",
      Self::Channel { .. } => "channel",
    }
  }
}

impl fmt::Display for CacheScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Repository { owner, repo } => write!(f, "{}/{}", owner, repo),
      Self::Channel {
        channel_id,
        channel_name: Some(name),
      } => write!(f, "#{} ({})", name, channel_id),
      Self::Channel { channel_id, .. } => write!(f, "{}", channel_id),
    }
  }
}

/// Percent-encode every byte outside `[A-Za-z0-9._]`, including '-' and '%'.
fn escape(component: &str) -> String {
  let mut out = String::with_capacity(component.len());
  for byte in component.bytes() {
    if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_') {
      out.push(char::from(byte));
    } else {
      out.push_str(&format!("%{:02X}", byte));
    }
  }
  out
}
