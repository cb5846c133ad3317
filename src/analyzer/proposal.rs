use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Field names the engine sometimes wraps its array in.
const WRAPPER_KEYS: &[&str] = &["proposals", "issues", "tasks"];

/// A suggested work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueProposal {
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub reasoning: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub related_slack_messages: Option<Vec<String>>,
}

/// Decode engine output into proposals without ever failing.
///
/// Accepts a bare array, or an object wrapping the array under one of the
/// known field names. Anything else (including invalid JSON) is an empty list.
/// Individual entries that do not look like proposals are dropped.
pub fn parse_proposals(content: &str) -> Vec<IssueProposal> {
  let value: Value = match serde_json::from_str(content.trim()) {
    Ok(value) => value,
    Err(e) => {
      warn!("Engine returned invalid JSON: {}", e);
      return Vec::new();
    }
  };

  let items = match value {
    Value::Array(items) => items,
    Value::Object(mut map) => WRAPPER_KEYS
      .iter()
      .find_map(|key| match map.remove(*key) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
      })
      .unwrap_or_default(),
    _ => Vec::new(),
  };

  items
    .into_iter()
    .filter_map(|item| match serde_json::from_value::<IssueProposal>(item) {
      Ok(proposal) => Some(proposal),
      Err(e) => {
        warn!("Dropping malformed proposal: {}", e);
        None
      }
    })
    .collect()
}

/// Render proposals for the terminal.
pub fn format_proposals(proposals: &[IssueProposal]) -> String {
  if proposals.is_empty() {
    return "\nNo new issues to propose. All topics seem to be covered.".to_string();
  }

  let rule = "=".repeat(80);
  let mut output = format!("\nFound {} issue proposal(s):\n{}\n", proposals.len(), rule);

  for (i, proposal) in proposals.iter().enumerate() {
    output.push_str(&format!("\n[{}] {}\n{}\n", i + 1, proposal.title, "-".repeat(80)));
    output.push_str(&format!("\n{}\n", proposal.description));
    output.push_str(&format!("\nReasoning: {}\n", proposal.reasoning));

    if let Some(related) = proposal.related_slack_messages.as_ref().filter(|r| !r.is_empty()) {
      output.push_str("\nRelated Slack messages:\n");
      for msg in related {
        output.push_str(&format!("  - {}\n", msg));
      }
    }

    output.push_str(&format!("\n{}\n", rule));
  }

  output
}

#[cfg(test)]
mod tests {
  use super::*;

  const ONE: &str = r#"{"title": "Fix login", "description": "d", "reasoning": "r"}"#;

  #[test]
  fn test_bare_array() {
    let proposals = parse_proposals(&format!("[{}]", ONE));
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].title, "Fix login");
    assert!(proposals[0].related_slack_messages.is_none());
  }

  #[test]
  fn test_wrapped_arrays() {
    for key in ["proposals", "issues", "tasks"] {
      let proposals = parse_proposals(&format!(r#"{{"{}": [{}]}}"#, key, ONE));
      assert_eq!(proposals.len(), 1, "wrapper key {}", key);
    }
  }

  #[test]
  fn test_wrapper_precedence_skips_non_arrays() {
    let content = format!(r#"{{"proposals": "none", "issues": [{}]}}"#, ONE);
    assert_eq!(parse_proposals(&content).len(), 1);
  }

  #[test]
  fn test_unknown_shapes_are_empty() {
    assert!(parse_proposals(r#"{"items": []}"#).is_empty());
    assert!(parse_proposals(r#""just text""#).is_empty());
    assert!(parse_proposals("[]").is_empty());
    assert!(parse_proposals("").is_empty());
    assert!(parse_proposals("Sure! Here are some ideas").is_empty());
  }

  #[test]
  fn test_malformed_entries_are_dropped() {
    let content = format!(r#"[{}, {{"description": "no title"}}, 3]"#, ONE);
    let proposals = parse_proposals(&content);
    assert_eq!(proposals.len(), 1);
  }

  #[test]
  fn test_related_messages_wire_name() {
    let content = r#"[{"title": "t", "description": "d", "reasoning": "r", "relatedSlackMessages": ["1700000000.1"]}]"#;
    let proposals = parse_proposals(content);
    assert_eq!(
      proposals[0].related_slack_messages,
      Some(vec!["1700000000.1".to_string()])
    );
  }

  #[test]
  fn test_format_proposals() {
    assert!(format_proposals(&[]).contains("No new issues"));

    let proposal = IssueProposal {
      title: "Add retries".to_string(),
      description: "Retry failed uploads".to_string(),
      reasoning: "Discussed twice".to_string(),
      related_slack_messages: Some(vec!["U1: uploads keep failing".to_string()]),
    };
    let text = format_proposals(&[proposal]);
    assert!(text.contains("Found 1 issue proposal(s)"));
    assert!(text.contains("[1] Add retries"));
    assert!(text.contains("Reasoning: Discussed twice"));
    assert!(text.contains("  - U1: uploads keep failing"));
  }
}
