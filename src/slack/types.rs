use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A channel message, or a thread reply when nested under `replies`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub ts: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,
  #[serde(default)]
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thread_ts: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_count: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub replies: Option<Vec<Message>>,
}

impl Message {
  /// Whether the message starts a thread worth fetching replies for.
  pub fn has_replies(&self) -> bool {
    self.thread_ts.is_some() && self.reply_count.unwrap_or(0) > 0
  }

  /// When the message was posted, if `ts` is a valid stamp.
  pub fn posted_at(&self) -> Option<DateTime<Utc>> {
    let seconds = self.ts.trim().parse::<f64>().ok()?;
    DateTime::from_timestamp_millis((seconds * 1000.0) as i64)
  }
}

/// Slack message timestamp ("1700000000.000100"), ordered numerically.
///
/// Equal numbers with different spellings stay distinct keys and are
/// ordered by their text, which keeps `Ord` consistent with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackTs(pub String);

impl SlackTs {
  /// Seconds since the epoch; unparsable stamps count as zero.
  pub fn seconds(&self) -> f64 {
    parse_ts(&self.0)
  }
}

impl Ord for SlackTs {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .seconds()
      .total_cmp(&other.seconds())
      .then_with(|| self.0.cmp(&other.0))
  }
}

impl PartialOrd for SlackTs {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

pub(crate) fn parse_ts(ts: &str) -> f64 {
  ts.trim().parse::<f64>().unwrap_or(0.0)
}

/// Render messages chronologically with indented thread replies.
pub fn format_messages(messages: &[Message]) -> String {
  let mut sorted: Vec<&Message> = messages.iter().collect();
  sorted.sort_by(|a, b| parse_ts(&a.ts).total_cmp(&parse_ts(&b.ts)));

  let mut output = String::new();
  for msg in sorted {
    output.push_str(&format!(
      "\n[{}] {}\n{}\n",
      ts_to_iso(&msg.ts),
      msg.user.as_deref().unwrap_or("unknown"),
      msg.text
    ));

    for reply in msg.replies.iter().flatten() {
      output.push_str(&format!(
        "  ↳ [{}] {}\n    {}\n",
        ts_to_iso(&reply.ts),
        reply.user.as_deref().unwrap_or("unknown"),
        reply.text
      ));
    }
  }
  output
}

fn ts_to_iso(ts: &str) -> String {
  let millis = (parse_ts(ts) * 1000.0) as i64;
  DateTime::from_timestamp_millis(millis)
    .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    .unwrap_or_else(|| ts.to_string())
}
