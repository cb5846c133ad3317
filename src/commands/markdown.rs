//! `md-issues`: turn a Markdown document into GitHub issues.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;

use super::propose::{confirm, process_proposals, Provenance};
use super::target_repo;
use crate::analyzer::{format_proposals, AnalyzerClient};
use crate::config::Config;
use crate::github::{GithubClient, RepoTarget};

pub async fn run(config: &Config, file: &Path, repo: Option<RepoTarget>, yes: bool) -> Result<()> {
  let markdown = read_document(file)?;
  println!("Reading file: {}", file.display());

  let target = target_repo(config, repo)?;
  let github = GithubClient::new(config, &target)?;
  let analyzer = AnalyzerClient::new(config)?;

  let proposals = analyzer.analyze_markdown(&markdown).await?;
  println!("{}", format_proposals(&proposals));

  if proposals.is_empty() {
    return Ok(());
  }
  process_proposals(&proposals, &github, Provenance::Markdown, |_| confirm(yes)).await?;
  Ok(())
}

fn read_document(file: &Path) -> Result<String> {
  if !file.exists() {
    return Err(eyre!("File not found: {}", file.display()));
  }
  let contents = std::fs::read_to_string(file)
    .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
  if contents.trim().is_empty() {
    return Err(eyre!("{} is empty", file.display()));
  }
  Ok(contents)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_read_document() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.md");
    assert!(read_document(&missing)
      .unwrap_err()
      .to_string()
      .contains("File not found"));

    let blank = dir.path().join("blank.md");
    std::fs::write(&blank, "  \n").unwrap();
    assert!(read_document(&blank).is_err());

    let notes = dir.path().join("notes.md");
    std::fs::write(&notes, "# Plan\n- ship it\n").unwrap();
    assert_eq!(read_document(&notes).unwrap(), "# Plan\n- ship it\n");
  }
}
