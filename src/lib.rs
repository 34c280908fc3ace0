//! Toolrec - tool recommendation service
//!
//! Turns a free-text description of a need into a small ranked set of
//! catalog tools: local candidate retrieval (vector or lexical), LLM
//! reranking, and an open-ended fallback when the catalog has no good
//! match, all driven by a per-user dialogue state machine.

pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod embedding;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod session;
pub mod state;

// Re-export key types for convenience
pub use catalog::{Catalog, ToolRecord};
pub use config::{Config, RetrievalStrategy};
pub use dialogue::{Control, InboundEvent, Reply};
pub use embedding::{SentenceEncoder, TextEmbedder};
pub use error::{AppError, Result};
pub use fallback::{FallbackRecommender, FallbackReply, Suggestion};
pub use handlers::{events_handler, health_handler, ready_handler};
pub use index::{FlatIndex, VectorIndex};
pub use pipeline::RecommendationOutcome;
pub use rerank::Reranker;
pub use session::{SessionContext, SessionState, SessionStore};
pub use state::{AppState, SearchSnapshot};
