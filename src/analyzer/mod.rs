//! Issue proposals from an OpenAI-compatible chat completions endpoint.

mod client;
mod log;
mod prompt;
mod proposal;

pub use client::AnalyzerClient;
pub use proposal::{format_proposals, IssueProposal};
