use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::github::RepoTarget;

/// Default location of the standalone repository list.
pub const REPOS_CONFIG_PATH: &str = "config/github-repos.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub github: GithubConfig,
  #[serde(default)]
  pub slack: SlackConfig,
  #[serde(default)]
  pub openai: OpenAiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  /// Where LLM interaction logs and file logs are written
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      github: GithubConfig::default(),
      slack: SlackConfig::default(),
      openai: OpenAiConfig::default(),
      storage: StorageConfig::default(),
      output_dir: default_output_dir(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
  #[serde(default = "default_github_api_url")]
  pub api_url: String,
  /// Repositories to mirror; falls back to config/github-repos.json, then env
  #[serde(default)]
  pub repositories: Vec<RepoTarget>,
  #[serde(default = "default_true")]
  pub include_pull_requests: bool,
  #[serde(default = "default_true")]
  pub include_comments: bool,
}

impl Default for GithubConfig {
  fn default() -> Self {
    Self {
      api_url: default_github_api_url(),
      repositories: Vec::new(),
      include_pull_requests: true,
      include_comments: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
  #[serde(default = "default_slack_api_url")]
  pub api_url: String,
  /// Channel names (with or without '#') to mirror
  #[serde(default)]
  pub channels: Vec<String>,
  /// Window for the initial full fetch
  #[serde(default = "default_initial_days")]
  pub initial_days: u32,
}

impl Default for SlackConfig {
  fn default() -> Self {
    Self {
      api_url: default_slack_api_url(),
      channels: Vec::new(),
      initial_days: default_initial_days(),
    }
  }
}

/// Language the proposal engine answers in.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  Ja,
  En,
}

impl Language {
  /// Read a language setting, also in locale form (`ja_JP.UTF-8`, `en_US:en`).
  ///
  /// Only the first entry of a `:` priority list counts. Japanese selects
  /// `Ja`; anything else answers in English.
  pub fn from_setting(value: &str) -> Self {
    let first = value.split(':').next().unwrap_or_default();
    let code = first
      .split(|c| matches!(c, '_' | '-' | '.' | '@'))
      .next()
      .unwrap_or_default()
      .trim()
      .to_lowercase();

    match code.as_str() {
      "ja" => Language::Ja,
      "en" => Language::En,
      _ => {
        warn!(value, "Unrecognised language setting, using English");
        Language::En
      }
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
  #[serde(default = "default_openai_api_url")]
  pub api_url: String,
  #[serde(default = "default_model")]
  pub model: String,
  #[serde(default)]
  pub language: Language,
}

impl Default for OpenAiConfig {
  fn default() -> Self {
    Self {
      api_url: default_openai_api_url(),
      model: default_model(),
      language: Language::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
  /// One JSON document per scope under `data_dir`
  #[default]
  Json,
  /// All snapshots in `data_dir/cache.db`
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  #[serde(default)]
  pub backend: StorageKind,
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      backend: StorageKind::default(),
      data_dir: default_data_dir(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_github_api_url() -> String {
  "https://api.github.com".to_string()
}

fn default_slack_api_url() -> String {
  "https://slack.com/api".to_string()
}

fn default_openai_api_url() -> String {
  "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
  "gpt-4o".to_string()
}

fn default_initial_days() -> u32 {
  30
}

fn default_data_dir() -> PathBuf {
  PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("output")
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ai-pm.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ai-pm/config.yaml
  ///
  /// Without any file the defaults are used, so a bare `.env` setup works.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ai-pm.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ai-pm").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Apply `OPENAI_MODEL` and the language setting.
  ///
  /// `AI_PM_LANGUAGE` wins over `LANGUAGE`, which desktop sessions often set
  /// to a locale list.
  fn with_env_overrides(mut self, env: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(model) = env("OPENAI_MODEL").filter(|m| !m.is_empty()) {
      self.openai.model = model;
    }
    let language = env("AI_PM_LANGUAGE")
      .filter(|l| !l.trim().is_empty())
      .or_else(|| env("LANGUAGE").filter(|l| !l.trim().is_empty()));
    if let Some(language) = language {
      self.openai.language = Language::from_setting(&language);
    }
    self
  }

  /// Repositories to process.
  ///
  /// Order of precedence: the config file's `github.repositories`, then
  /// config/github-repos.json, then `GITHUB_OWNER` + `GITHUB_REPO`.
  pub fn repositories(&self) -> Result<Vec<RepoTarget>> {
    if !self.github.repositories.is_empty() {
      return Ok(self.github.repositories.clone());
    }

    if let Some(repos) = load_repos_config(Path::new(REPOS_CONFIG_PATH))? {
      if !repos.is_empty() {
        return Ok(repos);
      }
    }

    repo_from_env(|key| std::env::var(key).ok()).map(|repo| vec![repo])
  }

  /// Get the GitHub token from `GITHUB_TOKEN`.
  pub fn github_token() -> Result<String> {
    required_env("GITHUB_TOKEN")
  }

  /// Get the Slack bot token.
  ///
  /// Checks SLACK_BOT_TOKEN first, then SLACK_TOKEN as fallback.
  pub fn slack_token() -> Result<String> {
    std::env::var("SLACK_BOT_TOKEN")
      .or_else(|_| std::env::var("SLACK_TOKEN"))
      .map_err(|_| {
        eyre!("Slack token not found. Set SLACK_BOT_TOKEN or SLACK_TOKEN environment variable.")
      })
  }

  /// Get the OpenAI API key from `OPENAI_API_KEY`.
  pub fn openai_api_key() -> Result<String> {
    required_env("OPENAI_API_KEY")
  }
}

fn required_env(key: &str) -> Result<String> {
  std::env::var(key)
    .ok()
    .filter(|v| !v.is_empty())
    .ok_or_else(|| eyre!("{} is required. Set it in the environment or in .env", key))
}

fn repo_from_env(env: impl Fn(&str) -> Option<String>) -> Result<RepoTarget> {
  let owner = env("GITHUB_OWNER")
    .filter(|v| !v.is_empty())
    .ok_or_else(|| eyre!("GITHUB_OWNER is required (or create {})", REPOS_CONFIG_PATH))?;
  let repo = env("GITHUB_REPO")
    .filter(|v| !v.is_empty())
    .ok_or_else(|| eyre!("GITHUB_REPO is required (or create {})", REPOS_CONFIG_PATH))?;
  Ok(RepoTarget::new(owner, repo))
}

/// Load a `{"repositories": [{"owner", "repo"}]}` list.
///
/// A missing file is `None`; a present but invalid file is an error.
pub fn load_repos_config(path: &Path) -> Result<Option<Vec<RepoTarget>>> {
  if !path.exists() {
    return Ok(None);
  }

  let data = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;

  let value: serde_json::Value =
    serde_json::from_str(&data).map_err(|_| eyre!("Invalid JSON in {}", path.display()))?;

  let entries = value
    .get("repositories")
    .and_then(|v| v.as_array())
    .ok_or_else(|| eyre!("\"repositories\" array is required in {}", path.display()))?;

  let mut repos = Vec::with_capacity(entries.len());
  for (i, entry) in entries.iter().enumerate() {
    let field = |name: &str| {
      entry
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| {
          eyre!(
            "Invalid entry at index {}: \"{}\" is required and must be a string",
            i,
            name
          )
        })
    };
    repos.push(RepoTarget::new(field("owner")?, field("repo")?));
  }

  Ok(Some(repos))
}
