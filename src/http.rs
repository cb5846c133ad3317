//! Small helpers shared by the REST clients.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use url::Url;

/// Parse an API root, making sure relative joins keep its path.
///
/// `Url::join` drops the last path segment unless it ends with '/', which
/// would turn `https://slack.com/api` + `conversations.list` into
/// `https://slack.com/conversations.list`.
pub fn base_url(api_url: &str) -> Result<Url> {
  let mut raw = api_url.trim().to_string();
  if !raw.ends_with('/') {
    raw.push('/');
  }
  Url::parse(&raw).map_err(|e| eyre!("Invalid API URL '{}': {}", api_url, e))
}

/// Check the HTTP status and decode a JSON body.
pub async fn read_json<T: DeserializeOwned>(
  response: reqwest::Response,
  service: &str,
  what: &str,
) -> Result<T> {
  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    return Err(eyre!(
      "{} API returned {} for {}: {}",
      service,
      status,
      what,
      body
    ));
  }

  response
    .json::<T>()
    .await
    .map_err(|e| eyre!("Failed to parse {} response for {}: {}", service, what, e))
}
