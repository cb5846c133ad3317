mod api_types;
mod cache;
mod client;
mod types;

pub use client::GithubClient;
pub use types::{format_issues, Issue, RepoTarget};
