use crate::config::{Config, Language};
use crate::http::{base_url, read_json};
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::log::{Interaction, InteractionLog};
use super::prompt::{conversation_prompt, markdown_prompt, Prompt};
use super::proposal::{parse_proposals, IssueProposal};

const TEMPERATURE: f64 = 0.7;

// ============================================================================
// Chat completions wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
  temperature: f64,
  response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
  #[serde(default)]
  content: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Turns conversations and documents into issue proposals
pub struct AnalyzerClient {
  http: reqwest::Client,
  base: Url,
  model: String,
  language: Language,
  log: Option<InteractionLog>,
}

impl AnalyzerClient {
  pub fn new(config: &Config) -> Result<Self> {
    let key = Config::openai_api_key()?;
    let client = Self::with_key(
      &config.openai.api_url,
      &key,
      &config.openai.model,
      config.openai.language,
    )?;
    Ok(client.with_log(InteractionLog::new(&config.output_dir)))
  }

  pub fn with_key(api_url: &str, key: &str, model: &str, language: Language) -> Result<Self> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(&format!("Bearer {}", key))
      .map_err(|e| eyre!("Invalid OpenAI API key: {}", e))?;
    headers.insert(AUTHORIZATION, auth);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create OpenAI client: {}", e))?;

    Ok(Self {
      http,
      base: base_url(api_url)?,
      model: model.to_string(),
      language,
      log: None,
    })
  }

  /// Record every exchange in a daily JSONL file.
  pub fn with_log(mut self, log: InteractionLog) -> Self {
    self.log = Some(log);
    self
  }

  /// Propose issues for topics in `messages` not covered by `issues`.
  pub async fn analyze_conversations(
    &self,
    messages: &str,
    issues: &str,
  ) -> Result<Vec<IssueProposal>> {
    info!(model = %self.model, "Analyzing conversations");
    let prompt = conversation_prompt(self.language, messages, issues);
    self.propose(&prompt, messages, Some(issues)).await
  }

  /// Propose issues from a free-form document.
  pub async fn analyze_markdown(&self, markdown: &str) -> Result<Vec<IssueProposal>> {
    info!(model = %self.model, "Analyzing document");
    let prompt = markdown_prompt(self.language, markdown);
    self.propose(&prompt, markdown, None).await
  }

  async fn propose(
    &self,
    prompt: &Prompt,
    input: &str,
    existing_issues: Option<&str>,
  ) -> Result<Vec<IssueProposal>> {
    let raw = self.complete(prompt).await?;

    let proposals = match raw.as_deref() {
      Some(content) if !content.trim().is_empty() => parse_proposals(content),
      _ => {
        warn!("Engine returned no content");
        Vec::new()
      }
    };
    info!(count = proposals.len(), "Received proposals");

    if let Some(log) = &self.log {
      let entry = Interaction {
        timestamp: Utc::now(),
        model: &self.model,
        input,
        existing_issues,
        raw_response: raw.as_deref().unwrap_or_default(),
        proposals: &proposals,
      };
      if let Err(e) = log.append(&entry) {
        warn!("Failed to write interaction log: {}", e);
      }
    }

    Ok(proposals)
  }

  /// Send one chat completion and return the first choice's content.
  async fn complete(&self, prompt: &Prompt) -> Result<Option<String>> {
    let url = self
      .base
      .join("chat/completions")
      .map_err(|e| eyre!("Invalid OpenAI endpoint: {}", e))?;

    let request = ChatCompletionRequest {
      model: &self.model,
      messages: vec![
        ChatMessage {
          role: "system",
          content: &prompt.system,
        },
        ChatMessage {
          role: "user",
          content: &prompt.user,
        },
      ],
      temperature: TEMPERATURE,
      response_format: ResponseFormat {
        kind: "json_object",
      },
    };

    let response = self
      .http
      .post(url)
      .json(&request)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach OpenAI: {}", e))?;

    let completion: ChatCompletionResponse =
      read_json(response, "OpenAI", "chat/completions").await?;

    Ok(
      completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn completion(content: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
      "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
  }

  fn client(server: &MockServer) -> AnalyzerClient {
    AnalyzerClient::with_key(&server.uri(), "sk-test", "gpt-4o", Language::En).unwrap()
  }

  #[tokio::test]
  async fn test_analyze_conversations_wrapped_proposals() {
    let server = MockServer::start().await;
    let content = json!({
      "proposals": [{
        "title": "Flaky upload",
        "description": "Uploads fail on retry",
        "reasoning": "Reported twice in #dev",
        "relatedSlackMessages": ["1700000000.000100"]
      }]
    })
    .to_string();

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .and(body_partial_json(json!({
        "model": "gpt-4o",
        "temperature": 0.7,
        "response_format": { "type": "json_object" }
      })))
      .respond_with(completion(json!(content)))
      .expect(1)
      .mount(&server)
      .await;

    let proposals = client(&server)
      .analyze_conversations("[2025-01-01] U1: upload broke", "No issues found.")
      .await
      .unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].title, "Flaky upload");
  }

  #[tokio::test]
  async fn test_empty_content_is_no_proposals() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(completion(json!(null)))
      .mount(&server)
      .await;

    let proposals = client(&server).analyze_markdown("# notes").await.unwrap();
    assert!(proposals.is_empty());
  }

  #[tokio::test]
  async fn test_api_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
      .mount(&server)
      .await;

    let err = client(&server)
      .analyze_markdown("# notes")
      .await
      .unwrap_err();
    assert!(err.to_string().contains("401"));
  }

  #[tokio::test]
  async fn test_interaction_is_logged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(completion(json!("[]")))
      .mount(&server)
      .await;

    let dir = tempfile::tempdir().unwrap();
    let analyzer = client(&server).with_log(InteractionLog::new(dir.path()));
    analyzer.analyze_conversations("msgs", "issues").await.unwrap();

    let log = InteractionLog::new(dir.path());
    let contents = std::fs::read_to_string(log.path_for(Utc::now())).unwrap();
    let record: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(record["input"], "msgs");
    assert_eq!(record["existingIssues"], "issues");
    assert_eq!(record["rawResponse"], "[]");

    let readable = std::fs::read_to_string(log.readable_path_for(Utc::now())).unwrap();
    assert!(readable.contains("## Existing issues\nissues"));
  }
}
