//! Shared fixtures for integration tests: a deterministic embedder and
//! stub rerank/fallback capabilities.
//!
//! Not every test binary uses every fixture.
#![allow(dead_code)]

use async_trait::async_trait;
use ndarray::Array2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use toolrec::fallback::{FallbackRecommender, FallbackReply};
use toolrec::{
    AppState, Catalog, Config, Reranker, Result, SearchSnapshot, TextEmbedder, ToolRecord,
};

/// Deterministic embedder: the vector depends only on the text bytes,
/// so the same text always lands on the same point.
pub struct StubEmbedder {
    pub dim: usize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl TextEmbedder for StubEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        let mut data = Vec::with_capacity(texts.len() * self.dim);
        for text in texts {
            let mut seed: u64 = 0xcbf29ce484222325;
            for byte in text.bytes() {
                seed ^= byte as u64;
                seed = seed.wrapping_mul(0x100000001b3);
            }
            let mut row = Vec::with_capacity(self.dim);
            for _ in 0..self.dim {
                seed = seed
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                row.push(((seed >> 33) as f32 / u32::MAX as f32) - 0.5);
            }
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for val in &mut row {
                    *val /= norm;
                }
            }
            data.extend(row);
        }
        Ok(Array2::from_shape_vec((texts.len(), self.dim), data).unwrap())
    }
}

/// Reranker that echoes every candidate name in order.
pub struct EchoReranker;

#[async_trait]
impl Reranker for EchoReranker {
    async fn rerank(&self, _query: &str, candidates: &[ToolRecord]) -> Vec<String> {
        candidates.iter().map(|c| c.name.clone()).collect()
    }
}

/// Reranker whose external call always fails; per the soft-failure
/// contract that surfaces as an empty result.
pub struct BrokenReranker;

#[async_trait]
impl Reranker for BrokenReranker {
    async fn rerank(&self, _query: &str, _candidates: &[ToolRecord]) -> Vec<String> {
        Vec::new()
    }
}

/// Fallback stub that counts invocations and records the queries.
pub struct CountingFallback {
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
    pub reply: FallbackReply,
}

impl CountingFallback {
    pub fn new(reply: FallbackReply) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            reply,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackRecommender for CountingFallback {
    async fn recommend(&self, query: &str) -> FallbackReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        self.reply.clone()
    }
}

pub fn record(
    name: &str,
    category: &str,
    description: &str,
    url: &str,
    keywords: &[&str],
) -> ToolRecord {
    ToolRecord {
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        url: url.to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn note_app() -> ToolRecord {
    record(
        "NoteApp",
        "productivity",
        "note taking app",
        "https://noteapp.example",
        &["notes", "writing"],
    )
}

/// State wired with stub capabilities over the given catalog, using
/// the lexical strategy so no index is needed.
pub fn lexical_state(
    catalog: Catalog,
    reranker: Arc<dyn Reranker>,
    fallback: Arc<dyn FallbackRecommender>,
) -> Arc<AppState> {
    let config = Config {
        retrieval_strategy: toolrec::RetrievalStrategy::Lexical,
        ..Config::default()
    };
    Arc::new(AppState::with_parts(
        config,
        SearchSnapshot {
            catalog,
            vector: None,
        },
        None,
        reranker,
        fallback,
        None,
    ))
}
