//! Thin JSON client for the relay's Control API.

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Control API client.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base: String,
    http: reqwest::Client,
}

impl RelayClient {
    /// Create a client for the relay at `server` (e.g. `http://localhost:3001`).
    pub fn new(server: &str) -> Self {
        Self {
            base: server.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// `GET path?query`, returning the JSON body.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach relay at {}", self.base))?;
        read_json(response).await
    }

    /// `POST path` with a JSON body, returning the JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach relay at {}", self.base))?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.context("Failed to read response")?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if !status.is_success() {
        bail!("relay returned {}: {}", status, error_text(&body, &text));
    }
    Ok(body)
}

/// The `error` field of an error body, or the raw text.
fn error_text<'a>(body: &'a Value, raw: &'a str) -> &'a str {
    body.get("error").and_then(Value::as_str).unwrap_or(raw)
}
