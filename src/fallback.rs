//! Open-ended fallback recommendation.
//!
//! Used when the catalog yields nothing acceptable: either ask the LLM
//! for suggestions from general knowledge, or ground it in a scoped web
//! search over a trusted domain. Every failure collapses into an
//! explicit "could not complete" reply; nothing propagates.

use crate::error::{AppError, Result};
use crate::llm::ChatClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const KNOWLEDGE_PROMPT: &str = "You are a software tool advisor. Recommend up to three real, \
     currently available tools for the user's need. Respond with JSON \
     of the form {\"recommendations\": [{\"name\": ..., \"description\": \
     ..., \"url\": ...}]}.";

const SUMMARY_PROMPT: &str = "You summarize web search results. Using ONLY the provided \
     snippets, describe which tools they suggest for the user's need. \
     If the snippets are not helpful, say so plainly. Do not add tools \
     the snippets do not mention.";

/// One out-of-catalog suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// Outcome of a fallback recommendation. `Failed` is the explicit
/// soft-failure the dialogue layer renders politely.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReply {
    Suggestions(Vec<Suggestion>),
    Summary(String),
    Failed,
}

#[async_trait]
pub trait FallbackRecommender: Send + Sync {
    async fn recommend(&self, query: &str) -> FallbackReply;
}

/// A snippet returned by the scoped web search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub url: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>>;
}

/// Search client scoped to one trusted domain via a `site:` filter.
/// Expects the endpoint to answer `{"results": [{title, snippet, url}]}`.
pub struct HttpSearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    domain: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchSnippet>,
}

impl HttpSearchProvider {
    pub fn new(endpoint: String, api_key: Option<String>, domain: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Fallback(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            domain,
        })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>> {
        let scoped_query = format!("site:{} {}", self.domain, query);

        let mut request = self.http.get(&self.endpoint).query(&[("q", scoped_query)]);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Fallback(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fallback(format!(
                "search API returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Fallback(format!("invalid search response: {}", e)))?;
        Ok(parsed.results)
    }
}

/// LLM-backed fallback. With a search provider configured it grounds
/// the answer in live snippets; otherwise it asks the LLM directly.
pub struct LlmFallback {
    client: Option<Arc<ChatClient>>,
    search: Option<Arc<dyn SearchProvider>>,
}

impl LlmFallback {
    pub fn new(
        client: Option<Arc<ChatClient>>,
        search: Option<Arc<dyn SearchProvider>>,
    ) -> Self {
        Self { client, search }
    }

    async fn from_knowledge(&self, client: &ChatClient, query: &str) -> Result<FallbackReply> {
        #[derive(Deserialize)]
        struct Recommendations {
            #[serde(default)]
            recommendations: Vec<Suggestion>,
        }

        let value = client
            .chat_json(KNOWLEDGE_PROMPT, &format!("User request: \"{}\"", query))
            .await?;
        let parsed: Recommendations = serde_json::from_value(value)
            .map_err(|e| AppError::Fallback(format!("unexpected response shape: {}", e)))?;

        if parsed.recommendations.is_empty() {
            return Ok(FallbackReply::Failed);
        }
        let mut suggestions = parsed.recommendations;
        suggestions.truncate(3);
        Ok(FallbackReply::Suggestions(suggestions))
    }

    async fn from_web(
        &self,
        client: &ChatClient,
        search: &dyn SearchProvider,
        query: &str,
    ) -> Result<FallbackReply> {
        let snippets = search.search(query).await?;
        if snippets.is_empty() {
            return Ok(FallbackReply::Failed);
        }

        let mut rendered = String::new();
        for s in snippets.iter().take(8) {
            rendered.push_str(&format!("- {}: {} ({})\n", s.title, s.snippet, s.url));
        }
        let user_msg = format!(
            "User request: \"{}\"\n\nSearch snippets:\n{}",
            query, rendered
        );

        let summary = client.chat_text(SUMMARY_PROMPT, &user_msg).await?;
        if summary.trim().is_empty() {
            return Ok(FallbackReply::Failed);
        }
        Ok(FallbackReply::Summary(summary))
    }
}

#[async_trait]
impl FallbackRecommender for LlmFallback {
    async fn recommend(&self, query: &str) -> FallbackReply {
        metrics::counter!("fallback_requests_total").increment(1);

        let Some(client) = &self.client else {
            tracing::warn!("Fallback requested but no LLM client is configured");
            return FallbackReply::Failed;
        };

        let result = match &self.search {
            Some(search) => self.from_web(client, search.as_ref(), query).await,
            None => self.from_knowledge(client, query).await,
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Fallback recommendation failed");
                FallbackReply::Failed
            }
        }
    }
}
