//! Text embedding capability.
//!
//! The index build and query-time retrieval must use the same embedder;
//! mixing embedders invalidates all stored distances. The trait seam
//! keeps the pipeline testable with a deterministic embedder.

mod encoder;

pub use encoder::SentenceEncoder;

use crate::error::Result;
use ndarray::Array2;

/// Produces one fixed-dimension vector per input string.
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of texts. Returns shape (texts.len(), dim).
    /// Deterministic for identical inputs.
    fn embed(&self, texts: &[String]) -> Result<Array2<f32>>;
}
