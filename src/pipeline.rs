//! Query pipeline: candidate retrieval, reranking, fallback.
//!
//! Retrieval and reranking failures never surface past this module;
//! they degrade into the fallback path or an explicit outcome the
//! dialogue layer can phrase politely.

use crate::catalog::ToolRecord;
use crate::config::RetrievalStrategy;
use crate::error::AppError;
use crate::fallback::FallbackReply;
use crate::retrieval;
use crate::state::{AppState, SearchSnapshot};
use std::collections::HashSet;
use std::sync::Arc;

/// Final results of one query cycle, best match first, at most three.
pub const RESULT_LIMIT: usize = 3;

#[derive(Debug)]
pub enum RecommendationOutcome {
    /// Catalog matches, ordered by relevance.
    Matches(Vec<ToolRecord>),
    /// Out-of-catalog recommendation (or its explicit failure).
    Fallback(FallbackReply),
    /// The configured retrieval resources are missing (no index or
    /// encoder); the caller should answer with the maintenance reply.
    Unavailable,
}

/// Smart flow: configured strategy, then rerank, then fallback.
pub async fn recommend_smart(state: &AppState, query: &str) -> RecommendationOutcome {
    let started = std::time::Instant::now();
    let snapshot = state.current_snapshot();

    let candidates = match state.config.retrieval_strategy {
        RetrievalStrategy::Lexical => retrieval::lexical_candidates(&snapshot.catalog, query),
        RetrievalStrategy::Vector => {
            let (Some(embedder), Some(_)) = (&state.embedder, &snapshot.vector) else {
                tracing::warn!("Vector retrieval requested but index or encoder is missing");
                return RecommendationOutcome::Unavailable;
            };

            let embedder = Arc::clone(embedder);
            let snapshot = Arc::clone(&snapshot);
            let query_text = query.to_string();
            let k = state.config.retrieval_candidates;

            let result = tokio::task::spawn_blocking(move || {
                let vector_index = snapshot.vector.as_ref().ok_or_else(|| {
                    AppError::IndexLoad("snapshot lost its index".to_string())
                })?;
                retrieval::vector_candidates(
                    &snapshot.catalog,
                    vector_index,
                    embedder.as_ref(),
                    &query_text,
                    k,
                )
            })
            .await;

            match result {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Vector retrieval failed");
                    return RecommendationOutcome::Unavailable;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Vector retrieval task failed");
                    return RecommendationOutcome::Unavailable;
                }
            }
        }
    };

    let outcome = rerank_or_fall_back(state, &snapshot, query, candidates).await;

    metrics::counter!("recommend_requests_total").increment(1);
    metrics::histogram!("recommend_latency_ms").record(started.elapsed().as_millis() as f64);
    outcome
}

/// Quick-search flow: lexical retrieval only, no reranking.
pub async fn recommend_quick(state: &AppState, keywords: &str) -> RecommendationOutcome {
    let snapshot = state.current_snapshot();
    let candidates = retrieval::lexical_candidates(&snapshot.catalog, keywords);

    metrics::counter!("recommend_requests_total").increment(1);

    if candidates.is_empty() {
        return RecommendationOutcome::Fallback(state.fallback.recommend(keywords).await);
    }
    RecommendationOutcome::Matches(candidates)
}

/// Rerank the candidate set; an empty candidate set or an empty rerank
/// result routes to the fallback recommender with the original query.
async fn rerank_or_fall_back(
    state: &AppState,
    snapshot: &SearchSnapshot,
    query: &str,
    candidates: Vec<ToolRecord>,
) -> RecommendationOutcome {
    if candidates.is_empty() {
        tracing::debug!(query, "No candidates; invoking fallback");
        return RecommendationOutcome::Fallback(state.fallback.recommend(query).await);
    }

    let best = state.reranker.rerank(query, &candidates).await;
    if best.is_empty() {
        tracing::debug!(query, "Reranker returned no confident match; invoking fallback");
        metrics::counter!("rerank_empty_total").increment(1);
        return RecommendationOutcome::Fallback(state.fallback.recommend(query).await);
    }

    // Resolve names against the snapshot the candidates came from;
    // unresolvable names are skipped silently, duplicates keep their
    // first position.
    let mut seen: HashSet<String> = HashSet::new();
    let mut matches = Vec::new();
    for name in best {
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        if let Some(record) = snapshot.catalog.find_by_name(&name) {
            matches.push(record.clone());
        }
        if matches.len() == RESULT_LIMIT {
            break;
        }
    }

    if matches.is_empty() {
        tracing::debug!(query, "No rerank result resolved to a record; invoking fallback");
        return RecommendationOutcome::Fallback(state.fallback.recommend(query).await);
    }
    RecommendationOutcome::Matches(matches)
}
