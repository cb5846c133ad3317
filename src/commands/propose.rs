//! Walk through proposals and create the accepted ones as GitHub issues.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::io::{self, BufRead, Write};
use tracing::error;

use crate::analyzer::IssueProposal;
use crate::github::GithubClient;

/// Where the proposals came from; decides the issue footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
  Slack,
  Markdown,
}

impl Provenance {
  fn footer(self) -> &'static str {
    match self {
      Provenance::Slack => "*This issue was automatically generated from Slack conversations*",
      Provenance::Markdown => "*This issue was automatically generated from a Markdown file*",
    }
  }
}

/// Counts after every proposal was answered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProposalTally {
  pub created: usize,
  pub declined: usize,
  pub failed: usize,
}

/// Issue body: the description, related messages for Slack proposals, then a footer.
pub fn issue_body(proposal: &IssueProposal, provenance: Provenance) -> String {
  let mut body = proposal.description.clone();

  if provenance == Provenance::Slack {
    if let Some(related) = proposal
      .related_slack_messages
      .as_ref()
      .filter(|r| !r.is_empty())
    {
      body.push_str("\n\n## Related Slack messages\n");
      for msg in related {
        body.push_str(&format!("- {}\n", msg));
      }
    }
  }

  body.push_str("\n\n---\n");
  body.push_str(provenance.footer());
  body
}

/// Accept "y" or "yes" in any case; everything else declines.
pub fn is_yes(answer: &str) -> bool {
  matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask on stdout and read one line from stdin.
///
/// The read runs on the blocking pool; std's stdin keeps its buffer across
/// calls, so piped answers are not lost between questions.
pub async fn ask_stdin(question: &str) -> Result<bool> {
  print!("{} (y/n): ", question);
  io::stdout()
    .flush()
    .map_err(|e| eyre!("Failed to flush stdout: {}", e))?;

  let answer = tokio::task::spawn_blocking(|| {
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer).map(|_| answer)
  })
  .await
  .map_err(|e| eyre!("Prompt task failed: {}", e))?
  .map_err(|e| eyre!("Failed to read answer: {}", e))?;

  Ok(is_yes(&answer))
}

/// Confirmation used by the commands: always yes, or ask on the terminal.
pub async fn confirm(auto_yes: bool) -> Result<bool> {
  if auto_yes {
    Ok(true)
  } else {
    ask_stdin("Create this issue on GitHub?").await
  }
}

/// What is shown right before a proposal's y/n question.
pub fn proposal_details(index: usize, total: usize, proposal: &IssueProposal) -> String {
  format!(
    "\n[{}/{}] {}\n{}\n\n{}\n\nReasoning: {}\n",
    index + 1,
    total,
    proposal.title,
    "-".repeat(80),
    proposal.description,
    proposal.reasoning
  )
}

/// Confirm each proposal in turn and create the accepted ones.
///
/// A failed creation is reported and the remaining proposals still run.
pub async fn process_proposals<F, Fut>(
  proposals: &[IssueProposal],
  github: &GithubClient,
  provenance: Provenance,
  mut approve: F,
) -> Result<ProposalTally>
where
  F: FnMut(&IssueProposal) -> Fut,
  Fut: Future<Output = Result<bool>>,
{
  let mut tally = ProposalTally::default();
  println!("\nProcessing proposals for {}...", github.target());

  for (i, proposal) in proposals.iter().enumerate() {
    println!("{}", proposal_details(i, proposals.len(), proposal));

    if !approve(proposal).await? {
      println!("  skipped");
      tally.declined += 1;
      continue;
    }

    let body = issue_body(proposal, provenance);
    match github.create_issue(&proposal.title, &body, &[]).await {
      Ok(issue) => {
        println!("  created: {}", issue.html_url);
        tally.created += 1;
      }
      Err(e) => {
        error!(title = %proposal.title, "Failed to create issue: {:#}", e);
        println!("  failed: {}", e);
        tally.failed += 1;
      }
    }
  }

  println!(
    "\nAll proposals processed. Created: {}, Skipped: {}, Failed: {}",
    tally.created, tally.declined, tally.failed
  );
  Ok(tally)
}
