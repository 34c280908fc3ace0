//! ONNX sentence encoder with a pooled session set.
//!
//! Mean pooling over token embeddings (excluding padding) followed by
//! L2 normalization, so squared-Euclidean distances in the index are
//! monotone with cosine similarity.

use crate::embedding::TextEmbedder;
use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ndarray::Array2;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::cell::UnsafeCell;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Sentence encoder backed by a pool of ONNX sessions.
///
/// # Safety
/// `Session::run` needs `&mut self`, but encode requests arrive
/// concurrently. Each request pops an exclusive session index from the
/// lock-free queue, so every `UnsafeCell<Session>` is accessed by at
/// most one thread between pop and push.
pub struct SentenceEncoder {
    sessions: Vec<UnsafeCell<Session>>,
    available: Arc<ArrayQueue<usize>>,
    tokenizer: Tokenizer,
    max_length: usize,
}

impl SentenceEncoder {
    /// Load the encoder model and tokenizer, creating `pool_size`
    /// independent sessions with one intra-op thread each.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            AppError::Embedding(format!("failed to load encoder tokenizer: {}", e))
        })?;

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::Embedding(format!("failed to read encoder model: {}", e)))?;

        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        let available = Arc::new(ArrayQueue::new(pool_size));

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::Embedding(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| AppError::Embedding(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| AppError::Embedding("failed to initialize session pool".into()))?;
        }

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            max_length,
            pool_size,
            "Sentence encoder loaded"
        );

        Ok(Self {
            sessions,
            available,
            tokenizer,
            max_length,
        })
    }

    fn acquire(&self) -> Result<usize> {
        self.available
            .pop()
            .ok_or_else(|| AppError::Resource("no available encoder sessions".into()))
    }

    fn release(&self, index: usize) {
        let _ = self.available.push(index);
    }

    fn encode_on_session(&self, session_idx: usize, texts: &[String]) -> Result<Array2<f32>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::Embedding(format!("tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| AppError::Embedding(e.to_string()))?;

        // SAFETY: the ArrayQueue hands out each index to one caller at a
        // time; this cell is exclusively ours until release().
        let session = unsafe { &mut *self.sessions[session_idx].get() };

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::Embedding(format!("encoder inference failed: {}", e)))?;

        let hidden_state = outputs.get("last_hidden_state").ok_or_else(|| {
            AppError::Embedding("no 'last_hidden_state' output found".to_string())
        })?;

        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        let hidden_size = shape_info[2] as usize;

        // Mean pooling with attention mask, then L2 normalize per row.
        let mut embeddings = Array2::zeros((batch_size, hidden_size));

        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                if attention_mask[i * max_len + j] == 1 {
                    let base_idx = i * max_len * hidden_size + j * hidden_size;
                    for (k, sum_val) in sum.iter_mut().enumerate() {
                        *sum_val += data[base_idx + k];
                    }
                    count += 1.0;
                }
            }

            if count > 0.0 {
                for (k, sum_val) in sum.iter().enumerate() {
                    embeddings[[i, k]] = sum_val / count;
                }
            }

            let norm: f32 = embeddings.row(i).iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                let mut row = embeddings.row_mut(i);
                for val in row.iter_mut() {
                    *val /= norm;
                }
            }
        }

        Ok(embeddings)
    }
}

impl TextEmbedder for SentenceEncoder {
    fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let session_idx = self.acquire()?;
        let result = self.encode_on_session(session_idx, texts);
        self.release(session_idx);
        result
    }
}

// SAFETY: session exclusivity is enforced by the ArrayQueue; between
// pop and push only one thread can reach each UnsafeCell<Session>.
// Tokenizer is only used through &self and is Sync.
unsafe impl Send for SentenceEncoder {}
unsafe impl Sync for SentenceEncoder {}
