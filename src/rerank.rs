//! Second-pass semantic reranking of the candidate set.
//!
//! The reranker fails soft by contract: any transport error, timeout,
//! or parse failure becomes an empty result, logged and treated as
//! "no confident match". It never raises to the caller.

use crate::catalog::ToolRecord;
use crate::llm::ChatClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a smart recommendation engine. From the candidate tools, \
     pick the ones that best match the user's request. Respond with \
     JSON of the form {\"best_matches\": [\"Tool1\", \"Tool2\"]}, using \
     only names from the candidates, best match first. Return an empty \
     list if none fit.";

/// Orders/narrows a candidate set to the best-matching tool names.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Best-matching names drawn from `candidates`, best first.
    /// Empty means "no confident match" (which includes any failure).
    async fn rerank(&self, query: &str, candidates: &[ToolRecord]) -> Vec<String>;
}

#[derive(Deserialize)]
struct BestMatches {
    #[serde(default)]
    best_matches: Vec<String>,
}

/// LLM-backed reranker. Without a configured client (no API key) it
/// returns empty immediately, making no call.
pub struct LlmReranker {
    client: Option<Arc<ChatClient>>,
}

impl LlmReranker {
    pub fn new(client: Option<Arc<ChatClient>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(&self, query: &str, candidates: &[ToolRecord]) -> Vec<String> {
        let Some(client) = &self.client else {
            return Vec::new();
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let candidates_json = match serde_json::to_string(candidates) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode candidates for reranking");
                return Vec::new();
            }
        };
        let user_msg = format!(
            "User request: \"{}\"\n\nCandidates:\n{}",
            query, candidates_json
        );

        match client.chat_json(SYSTEM_PROMPT, &user_msg).await {
            Ok(value) => match serde_json::from_value::<BestMatches>(value) {
                Ok(parsed) => parsed.best_matches,
                Err(e) => {
                    tracing::warn!(error = %e, "Rerank response did not match expected shape");
                    metrics::counter!("rerank_failures_total").increment(1);
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Rerank call failed, treating as no match");
                metrics::counter!("rerank_failures_total").increment(1);
                Vec::new()
            }
        }
    }
}
