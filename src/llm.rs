//! Chat-completions client for the reranking and fallback capabilities.
//!
//! Talks to an OpenAI-compatible endpoint (Groq-hosted by default).
//! Callers own the failure policy; this client only reports errors.

use crate::error::{AppError, Result};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 512;

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Rerank(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    /// One completion expected to be a JSON object; the parsed object
    /// is returned. Any transport or shape deviation is an error.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<Value> {
        let content = self.complete(system, user, true).await?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Rerank(format!("response is not valid JSON: {}", e)))
    }

    /// One free-form text completion.
    pub async fn chat_text(&self, system: &str, user: &str) -> Result<String> {
        self.complete(system, user, false).await
    }

    async fn complete(&self, system: &str, user: &str, json_mode: bool) -> Result<String> {
        let mut request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        if json_mode {
            request["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Rerank(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Rerank(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Rerank(format!("invalid response body: {}", e)))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Rerank("response has no message content".to_string()))
    }
}
