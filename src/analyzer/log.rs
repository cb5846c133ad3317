//! Append-only record of every engine exchange.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::proposal::IssueProposal;

/// One line of `llm-<date>.jsonl`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction<'a> {
  pub timestamp: DateTime<Utc>,
  pub model: &'a str,
  pub input: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub existing_issues: Option<&'a str>,
  pub raw_response: &'a str,
  pub proposals: &'a [IssueProposal],
}

#[derive(Debug, Clone)]
pub struct InteractionLog {
  dir: PathBuf,
}

impl InteractionLog {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Daily file the given moment belongs to.
  pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
    self.dir.join(format!("llm-{}.jsonl", at.format("%Y-%m-%d")))
  }

  /// Plain-text companion of [`Self::path_for`].
  pub fn readable_path_for(&self, at: DateTime<Utc>) -> PathBuf {
    self.path_for(at).with_extension("log")
  }

  pub fn append(&self, entry: &Interaction<'_>) -> Result<PathBuf> {
    std::fs::create_dir_all(&self.dir)
      .map_err(|e| eyre!("Failed to create {}: {}", self.dir.display(), e))?;

    let path = self.path_for(entry.timestamp);
    let line = serde_json::to_string(entry)
      .map_err(|e| eyre!("Failed to serialize interaction: {}", e))?;

    append_line(&path, &line)?;
    append_line(&self.readable_path_for(entry.timestamp), &readable(entry))?;
    Ok(path)
  }
}

/// Human-readable rendering of one exchange, sections separated by rules.
fn readable(entry: &Interaction<'_>) -> String {
  let rule = "=".repeat(80);
  let mut out = format!(
    "{}\n{}  model: {}\n{}\n\n## Input\n{}\n",
    rule,
    entry.timestamp.to_rfc3339(),
    entry.model,
    rule,
    entry.input.trim_end()
  );

  if let Some(issues) = entry.existing_issues.filter(|i| !i.trim().is_empty()) {
    out.push_str(&format!("\n## Existing issues\n{}\n", issues.trim_end()));
  }
  out.push_str(&format!("\n## Raw response\n{}\n", entry.raw_response.trim_end()));

  out.push_str(&format!("\n## Proposals ({})\n", entry.proposals.len()));
  for (i, proposal) in entry.proposals.iter().enumerate() {
    out.push_str(&format!(
      "\n[{}] {}\n{}\nReasoning: {}\n",
      i + 1,
      proposal.title,
      proposal.description,
      proposal.reasoning
    ));
    for msg in proposal.related_slack_messages.iter().flatten() {
      out.push_str(&format!("  - {}\n", msg));
    }
  }
  out
}

fn append_line(path: &Path, line: &str) -> Result<()> {
  let mut file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| eyre!("Failed to open {}: {}", path.display(), e))?;
  writeln!(file, "{}", line).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}
