use serde::{Deserialize, Serialize};

/// A GitHub issue (or pull request) as mirrored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub created_at: String,
  pub html_url: String,
  pub state: String,
  #[serde(default)]
  pub labels: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comments: Option<Vec<Comment>>,
}

/// A comment on an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: u64,
  pub user: String,
  pub created_at: String,
  pub body: String,
}

/// Owner/repository pair identifying a tracked repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
  pub owner: String,
  pub repo: String,
}

impl RepoTarget {
  pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self {
      owner: owner.into(),
      repo: repo.into(),
    }
  }
}

impl std::fmt::Display for RepoTarget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.owner, self.repo)
  }
}

impl std::str::FromStr for RepoTarget {
  type Err = String;

  /// Parse `owner/repo`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('/') {
      Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
        Ok(Self::new(owner, repo))
      }
      _ => Err(format!("expected owner/repo, got '{}'", s)),
    }
  }
}

/// Render issues as a plain-text context block.
pub fn format_issues(issues: &[Issue]) -> String {
  if issues.is_empty() {
    return "No issues found.".to_string();
  }

  let mut output = String::new();
  for issue in issues {
    output.push_str(&format!("\n#{}: {}\n", issue.number, issue.title));
    output.push_str(&format!("Created: {}\n", issue.created_at));
    output.push_str(&format!("State: {}\n", issue.state));
    if !issue.labels.is_empty() {
      output.push_str(&format!("Labels: {}\n", issue.labels.join(", ")));
    }
    if let Some(body) = issue.body.as_deref().filter(|b| !b.is_empty()) {
      output.push_str(&format!("Body:\n{}\n", body));
    }
    output.push_str(&format!("URL: {}\n", issue.html_url));
    output.push_str("---\n");
  }
  output
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_repo_target() {
    let target: RepoTarget = "octo/app".parse().unwrap();
    assert_eq!(target, RepoTarget::new("octo", "app"));
    assert!("octo".parse::<RepoTarget>().is_err());
    assert!("/app".parse::<RepoTarget>().is_err());
    assert!("a/b/c".parse::<RepoTarget>().is_err());
  }

  #[test]
  fn test_format_issues() {
    assert_eq!(format_issues(&[]), "No issues found.");

    let issue = Issue {
      number: 4,
      title: "Crash on start".to_string(),
      body: Some("Stack trace".to_string()),
      created_at: "2024-01-01T00:00:00Z".to_string(),
      html_url: "https://github.com/octo/app/issues/4".to_string(),
      state: "open".to_string(),
      labels: vec!["bug".to_string(), "p1".to_string()],
      comments: None,
    };
    let text = format_issues(&[issue]);
    assert!(text.contains("#4: Crash on start"));
    assert!(text.contains("Labels: bug, p1"));
    assert!(text.contains("Body:\nStack trace"));
    assert!(text.ends_with("---\n"));
  }

  #[test]
  fn test_cached_issue_without_comments_field() {
    let json = r#"{"number":1,"title":"t","body":null,"created_at":"c","html_url":"u","state":"open","labels":[]}"#;
    let issue: Issue = serde_json::from_str(json).unwrap();
    assert!(issue.comments.is_none());
    assert!(issue.body.is_none());
  }
}
