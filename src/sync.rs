//! Sequential processing of many cache scopes.

use color_eyre::Result;
use std::fmt;
use std::future::Future;
use tracing::{error, info};

use crate::cache::SyncOutcome;

/// Tally of a multi-scope run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
  pub done: usize,
  pub skipped: usize,
  pub failed: usize,
}

impl RunSummary {
  pub fn record(&mut self, result: &Result<SyncOutcome>) {
    match result {
      Ok(outcome) if outcome.is_skipped() => self.skipped += 1,
      Ok(_) => self.done += 1,
      Err(_) => self.failed += 1,
    }
  }
}

impl fmt::Display for RunSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Done: {}, Skipped: {}, Failed: {}",
      self.done, self.skipped, self.failed
    )
  }
}

/// Run `step` for every scope in order.
///
/// A failing scope is logged and counted; the remaining scopes still run.
pub async fn run_each<I, F, Fut>(scopes: I, mut step: F) -> RunSummary
where
  I: IntoIterator,
  I::Item: fmt::Display,
  F: FnMut(I::Item) -> Fut,
  Fut: Future<Output = Result<SyncOutcome>>,
{
  let mut summary = RunSummary::default();

  for scope in scopes {
    let label = scope.to_string();
    println!("\n{}", label);

    let result = step(scope).await;
    match &result {
      Ok(outcome) => println!("  {}", outcome),
      Err(e) => {
        error!(scope = %label, "{:#}", e);
        println!("  failed: {}", e);
      }
    }
    summary.record(&result);
  }

  info!(%summary, "Run finished");
  summary
}
