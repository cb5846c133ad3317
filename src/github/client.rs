use crate::config::Config;
use crate::date_range::DateRange;
use crate::github::api_types::{ApiComment, ApiCreateIssue, ApiIssue};
use crate::github::types::{Comment, Issue, RepoTarget};
use crate::http::{base_url, read_json};
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use url::Url;

const PER_PAGE: u32 = 100;

/// GitHub REST API client scoped to one repository
#[derive(Clone)]
pub struct GithubClient {
  http: reqwest::Client,
  base: Url,
  target: RepoTarget,
}

impl GithubClient {
  pub fn new(config: &Config, target: &RepoTarget) -> Result<Self> {
    let token = Config::github_token()?;
    Self::with_token(&config.github.api_url, &token, target.clone())
  }

  pub fn with_token(api_url: &str, token: &str, target: RepoTarget) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      ACCEPT,
      HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static("ai-pm"));
    headers.insert(
      "X-GitHub-Api-Version",
      HeaderValue::from_static("2022-11-28"),
    );
    let auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| eyre!("Invalid GitHub token: {}", e))?;
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create GitHub client: {}", e))?;

    Ok(Self {
      http,
      base: base_url(api_url)?,
      target,
    })
  }

  pub fn target(&self) -> &RepoTarget {
    &self.target
  }

  /// Fetch every issue (state=all), newest first.
  pub async fn list_all_issues(
    &self,
    include_pull_requests: bool,
    include_comments: bool,
  ) -> Result<Vec<Issue>> {
    info!(repo = %self.target, "Fetching all GitHub issues");

    let mut issues = self
      .list_issue_pages("created", None, include_pull_requests)
      .await?;
    info!(repo = %self.target, count = issues.len(), "Fetched issues");

    if include_comments {
      self.attach_comments(&mut issues).await;
    }
    Ok(issues)
  }

  /// Fetch issues updated at or after `since`.
  pub async fn list_issues_since(
    &self,
    since: DateTime<Utc>,
    include_pull_requests: bool,
    include_comments: bool,
  ) -> Result<Vec<Issue>> {
    info!(repo = %self.target, since = %since.to_rfc3339(), "Fetching updated GitHub issues");

    let since = since.to_rfc3339();
    let mut issues = self
      .list_issue_pages("updated", Some(&since), include_pull_requests)
      .await?;
    info!(repo = %self.target, count = issues.len(), "Fetched updated issues");

    if include_comments && !issues.is_empty() {
      self.attach_comments(&mut issues).await;
    }
    Ok(issues)
  }

  /// Fetch issues created inside `range`, pull requests excluded.
  ///
  /// Pages are walked newest first, so paging stops at the first issue
  /// created before the range.
  pub async fn list_issues_in_range(&self, range: &DateRange) -> Result<Vec<Issue>> {
    let path = self.repo_path("issues");
    let mut issues = Vec::new();
    let mut page = 1u32;

    loop {
      let batch: Vec<ApiIssue> = self.get_json(&path, &issue_query(page, "created", None)).await?;
      if batch.is_empty() {
        break;
      }

      for api_issue in batch {
        if api_issue.is_pull_request() {
          continue;
        }

        let created_at = match DateTime::parse_from_rfc3339(&api_issue.created_at) {
          Ok(dt) => dt.with_timezone(&Utc),
          Err(e) => {
            warn!(number = api_issue.number, "Skipping issue with bad created_at: {}", e);
            continue;
          }
        };

        if created_at < range.start {
          info!(repo = %self.target, count = issues.len(), "Fetched issues in range");
          return Ok(issues);
        }
        if range.contains(created_at) {
          issues.push(api_issue.into_issue());
        }
      }

      page += 1;
    }

    info!(repo = %self.target, count = issues.len(), "Fetched issues in range");
    Ok(issues)
  }

  /// Fetch all comments of an issue.
  pub async fn list_comments(&self, number: u64) -> Result<Vec<Comment>> {
    let path = self.repo_path(&format!("issues/{}/comments", number));
    let mut comments = Vec::new();
    let mut page = 1u32;

    loop {
      let query = [
        ("per_page", PER_PAGE.to_string()),
        ("page", page.to_string()),
      ];
      let batch: Vec<ApiComment> = self.get_json(&path, &query).await?;
      if batch.is_empty() {
        break;
      }
      comments.extend(batch.into_iter().map(Comment::from));
      page += 1;
    }

    Ok(comments)
  }

  /// Create a new issue
  pub async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue> {
    let url = self.endpoint(&self.repo_path("issues"))?;

    let response = self
      .http
      .post(url)
      .json(&ApiCreateIssue {
        title,
        body,
        labels,
      })
      .send()
      .await
      .map_err(|e| eyre!("Failed to create issue: {}", e))?;

    let created: ApiIssue = read_json(response, "GitHub", "create issue").await?;
    info!(repo = %self.target, number = created.number, "Created issue");
    Ok(created.into_issue())
  }

  /// Walk `/issues` pages until an empty page.
  async fn list_issue_pages(
    &self,
    sort: &str,
    since: Option<&str>,
    include_pull_requests: bool,
  ) -> Result<Vec<Issue>> {
    let path = self.repo_path("issues");
    let mut issues = Vec::new();
    let mut page = 1u32;

    loop {
      info!(repo = %self.target, page, "Fetching issues page");
      let batch: Vec<ApiIssue> = self.get_json(&path, &issue_query(page, sort, since)).await?;
      if batch.is_empty() {
        break;
      }

      issues.extend(
        batch
          .into_iter()
          .filter(|i| include_pull_requests || !i.is_pull_request())
          .map(ApiIssue::into_issue),
      );
      page += 1;
    }

    Ok(issues)
  }

  /// Fetch comments one issue at a time.
  ///
  /// A failure for a single issue is logged and leaves that issue with no comments.
  async fn attach_comments(&self, issues: &mut [Issue]) {
    let total = issues.len();
    info!(repo = %self.target, total, "Fetching comments");

    for (i, issue) in issues.iter_mut().enumerate() {
      if (i + 1) % 50 == 0 {
        info!(repo = %self.target, "Processing {}/{}", i + 1, total);
      }
      let comments = match self.list_comments(issue.number).await {
        Ok(comments) => comments,
        Err(e) => {
          warn!(repo = %self.target, number = issue.number, "Failed to fetch comments: {}", e);
          Vec::new()
        }
      };
      issue.comments = Some(comments);
    }
  }

  fn repo_path(&self, rest: &str) -> String {
    format!("repos/{}/{}/{}", self.target.owner, self.target.repo, rest)
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid GitHub endpoint {}: {}", path, e))
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    let url = self.endpoint(path)?;
    let response = self
      .http
      .get(url)
      .query(query)
      .send()
      .await
      .map_err(|e| eyre!("GitHub request to {} failed: {}", path, e))?;

    read_json(response, "GitHub", path).await
  }
}

fn issue_query(page: u32, sort: &str, since: Option<&str>) -> Vec<(&'static str, String)> {
  let mut query = vec![
    ("state", "all".to_string()),
    ("sort", sort.to_string()),
    ("direction", "desc".to_string()),
    ("per_page", PER_PAGE.to_string()),
    ("page", page.to_string()),
  ];
  if let Some(since) = since {
    query.push(("since", since.to_string()));
  }
  query
}
