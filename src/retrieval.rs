//! First-pass candidate retrieval.
//!
//! Two interchangeable strategies behind the same "bounded candidate
//! set" contract: nearest-neighbor lookup against the vector index, or
//! a weighted lexical scorer over the catalog. Both are deterministic
//! for identical inputs and catalog state.

use crate::catalog::{Catalog, ToolRecord};
use crate::embedding::TextEmbedder;
use crate::error::Result;
use crate::index::VectorIndex;
use std::collections::HashSet;

/// Upper bound on lexically retrieved candidates.
pub const LEXICAL_LIMIT: usize = 3;

/// Substring-match weights for the lexical scorer.
const CATEGORY_WEIGHT: f32 = 3.0;
const NAME_WEIGHT: f32 = 2.0;
const KEYWORD_WEIGHT: f32 = 1.0;
const DESCRIPTION_WEIGHT: f32 = 0.5;

/// Split a raw query into lowercase keywords on whitespace and commas.
pub fn tokenize_keywords(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Weighted lexical score of one record against the query keywords.
/// Matches across multiple keywords accumulate additively.
pub fn lexical_score(record: &ToolRecord, keywords: &[String]) -> f32 {
    let category = record.category.to_lowercase();
    let name = record.name.to_lowercase();
    let description = record.description.to_lowercase();
    let record_keywords: Vec<String> =
        record.keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut score = 0.0;
    for kw in keywords {
        if category.contains(kw.as_str()) {
            score += CATEGORY_WEIGHT;
        }
        if name.contains(kw.as_str()) {
            score += NAME_WEIGHT;
        }
        if record_keywords.iter().any(|rk| rk.contains(kw.as_str())) {
            score += KEYWORD_WEIGHT;
        }
        if description.contains(kw.as_str()) {
            score += DESCRIPTION_WEIGHT;
        }
    }
    score
}

/// Lexical retrieval: score every record, drop zero scores, sort by
/// descending score (stable, so catalog order breaks ties), keep the
/// top [`LEXICAL_LIMIT`].
pub fn lexical_candidates(catalog: &Catalog, raw_query: &str) -> Vec<ToolRecord> {
    let keywords = tokenize_keywords(raw_query);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &ToolRecord)> = catalog
        .all()
        .iter()
        .map(|record| (lexical_score(record, &keywords), record))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(LEXICAL_LIMIT)
        .map(|(_, record)| record.clone())
        .collect()
}

/// Vector retrieval: embed the raw query with the index's embedder,
/// take the `k` nearest rows, and resolve them to records. Rows whose
/// name the catalog no longer has are dropped silently (index/catalog
/// drift is tolerated, not fatal).
pub fn vector_candidates(
    catalog: &Catalog,
    vector_index: &VectorIndex,
    embedder: &dyn TextEmbedder,
    query: &str,
    k: usize,
) -> Result<Vec<ToolRecord>> {
    let embedded = embedder.embed(&[query.to_string()])?;
    if embedded.nrows() == 0 {
        return Err(crate::error::AppError::Embedding(
            "embedder returned no vector for the query".to_string(),
        ));
    }
    let query_vec: Vec<f32> = embedded.row(0).iter().copied().collect();

    let hits = vector_index.index.search(&query_vec, k)?;

    let mut seen: HashSet<String> = HashSet::with_capacity(hits.len());
    let mut candidates = Vec::with_capacity(hits.len());
    for (row, _dist) in hits {
        let Some(name) = vector_index.names.get(row) else {
            continue;
        };
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        if let Some(record) = catalog.find_by_name(name) {
            candidates.push(record.clone());
        }
    }
    Ok(candidates)
}
