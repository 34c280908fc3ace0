//! Flat (exact-distance) vector index over catalog embeddings.
//!
//! The index rows correlate to tool identities only through the
//! positional identity map built alongside it; the two are one unit and
//! must always be built, saved, and loaded together.

mod persistence;

pub use persistence::{load_vector_index, save_vector_index};

use crate::catalog::Catalog;
use crate::embedding::TextEmbedder;
use crate::error::{AppError, Result};
use ndarray::Array2;
use sha2::{Digest, Sha256};

/// Exact nearest-neighbor index using squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    pub fn new(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    pub fn rows(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub(crate) fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Up to `k` nearest rows by squared L2 distance, ascending.
    /// Ties resolve to the lower row. Fewer than `k` rows returns all.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.rows() == 0 || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim() {
            return Err(AppError::Embedding(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(row, vec)| {
                let dist: f32 = vec
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (row, dist)
            })
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// The index together with its row-to-name identity map.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub index: FlatIndex,
    /// Row `i` of the index was built from the record named `names[i]`.
    pub names: Vec<String>,
    /// Hash of the catalog snapshot the index was built from.
    pub catalog_hash: [u8; 32],
}

impl VectorIndex {
    /// Embed every catalog record's canonical text and build the index
    /// plus its positional identity map.
    pub fn build(catalog: &Catalog, embedder: &dyn TextEmbedder) -> Result<Self> {
        let texts: Vec<String> = catalog
            .all()
            .iter()
            .map(|r| r.canonical_text())
            .collect();
        let names: Vec<String> = catalog.all().iter().map(|r| r.name.clone()).collect();

        let vectors = embedder.embed(&texts)?;
        if vectors.nrows() != names.len() {
            return Err(AppError::Embedding(format!(
                "embedder returned {} vectors for {} records",
                vectors.nrows(),
                names.len()
            )));
        }

        Ok(Self {
            index: FlatIndex::new(vectors),
            names,
            catalog_hash: catalog_hash(catalog),
        })
    }

    /// Validate the pairing invariant: one name per index row.
    pub fn validate(&self) -> Result<()> {
        if self.index.rows() != self.names.len() {
            return Err(AppError::IndexMismatch(format!(
                "index has {} rows but identity map has {} entries",
                self.index.rows(),
                self.names.len()
            )));
        }
        Ok(())
    }
}

/// Hash of the catalog identity+text content, recorded in the index
/// artifact so a stale index can be spotted in the logs.
pub fn catalog_hash(catalog: &Catalog) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for record in catalog.all() {
        hasher.update(record.name.as_bytes());
        hasher.update(b"|");
        hasher.update(record.canonical_text().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}
