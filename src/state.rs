use crate::catalog::Catalog;
use crate::config::Config;
use crate::embedding::{SentenceEncoder, TextEmbedder};
use crate::error::{AppError, Result};
use crate::fallback::{FallbackRecommender, HttpSearchProvider, LlmFallback, SearchProvider};
use crate::index::{self, VectorIndex};
use crate::llm::ChatClient;
use crate::rerank::{LlmReranker, Reranker};
use crate::session::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Immutable unit the retrieval path reads: the catalog and, when
/// available, the vector index built from it. Replaced wholesale by
/// reload/rebuild; readers clone the `Arc` and are never exposed to a
/// partially updated structure.
pub struct SearchSnapshot {
    pub catalog: Catalog,
    pub vector: Option<VectorIndex>,
}

/// Application state shared across all request handlers.
pub struct AppState {
    pub config: Config,
    snapshot: RwLock<Arc<SearchSnapshot>>,
    pub sessions: SessionStore,
    pub embedder: Option<Arc<dyn TextEmbedder>>,
    pub reranker: Arc<dyn Reranker>,
    pub fallback: Arc<dyn FallbackRecommender>,
    /// Shared LLM client, also used directly for price lookups.
    pub llm: Option<Arc<ChatClient>>,
    rebuild_in_progress: AtomicBool,
    ready: AtomicBool,
}

impl AppState {
    /// Initialize state from configuration.
    ///
    /// Startup is deliberately tolerant: a missing catalog serves empty
    /// (logged critical), a missing or inconsistent index just disables
    /// vector retrieval until a rebuild succeeds. Only configuration
    /// errors abort the process, at the caller.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = match Catalog::load(&config.catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!(error = %e, "FATAL: could not load catalog, serving empty");
                Catalog::empty()
            }
        };

        let embedder: Option<Arc<dyn TextEmbedder>> = match SentenceEncoder::load(
            &config.encoder_model_path,
            &config.encoder_tokenizer_path,
            config.max_sequence_length,
            config.encoder_pool_size,
        ) {
            Ok(encoder) => Some(Arc::new(encoder)),
            Err(e) => {
                tracing::warn!(error = %e, "Encoder unavailable, vector retrieval disabled");
                None
            }
        };

        let vector = match index::load_vector_index(&config.index_path(), &config.mapping_path())
        {
            Ok(vector_index) => {
                if vector_index.catalog_hash != index::catalog_hash(&catalog) {
                    tracing::warn!(
                        "Index was built from a different catalog snapshot; \
                         unresolvable rows will be dropped at query time"
                    );
                }
                Some(vector_index)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Vector index unavailable until a rebuild succeeds");
                None
            }
        };

        let llm = match &config.llm_api_key {
            Some(key) => Some(Arc::new(ChatClient::new(
                config.llm_base_url.clone(),
                key.clone(),
                config.llm_model.clone(),
            )?)),
            None => {
                tracing::warn!("No LLM API key configured; reranking and fallback are disabled");
                None
            }
        };

        let search: Option<Arc<dyn SearchProvider>> = match &config.search_api_url {
            Some(endpoint) => Some(Arc::new(HttpSearchProvider::new(
                endpoint.clone(),
                config.search_api_key.clone(),
                config.search_domain.clone(),
            )?)),
            None => None,
        };

        let reranker: Arc<dyn Reranker> = Arc::new(LlmReranker::new(llm.clone()));
        let fallback: Arc<dyn FallbackRecommender> =
            Arc::new(LlmFallback::new(llm.clone(), search));

        Ok(Self::with_parts(
            config,
            SearchSnapshot { catalog, vector },
            embedder,
            reranker,
            fallback,
            llm,
        ))
    }

    /// Assemble state from pre-built parts. This is the seam tests use
    /// to inject stub capabilities.
    pub fn with_parts(
        config: Config,
        snapshot: SearchSnapshot,
        embedder: Option<Arc<dyn TextEmbedder>>,
        reranker: Arc<dyn Reranker>,
        fallback: Arc<dyn FallbackRecommender>,
        llm: Option<Arc<ChatClient>>,
    ) -> Self {
        let state = Self {
            config,
            snapshot: RwLock::new(Arc::new(snapshot)),
            sessions: SessionStore::new(),
            embedder,
            reranker,
            fallback,
            llm,
            rebuild_in_progress: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        };
        state.ready.store(true, Ordering::SeqCst);
        state
    }

    /// Current snapshot; callers keep querying the clone they took even
    /// if a rebuild installs a replacement mid-flight.
    pub fn current_snapshot(&self) -> Arc<SearchSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Atomically publish a fully built snapshot.
    pub fn install_snapshot(&self, snapshot: SearchSnapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Kick off an asynchronous catalog reload + index rebuild.
    ///
    /// Runs off the request path; queries keep hitting the installed
    /// snapshot until the new pair is complete, then it is swapped in
    /// atomically. Returns the job id, or an explanation when a rebuild
    /// is already running or no embedder is available.
    pub fn trigger_rebuild(self: &Arc<Self>) -> std::result::Result<Uuid, &'static str> {
        if self.embedder.is_none() {
            return Err("no encoder available; rebuild is not possible");
        }
        if self
            .rebuild_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err("a rebuild is already in progress");
        }

        let job = Uuid::new_v4();
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let started = std::time::Instant::now();
            match state.rebuild_once().await {
                Ok(tools) => {
                    tracing::info!(
                        job = %job,
                        tools,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Index rebuild completed and installed"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        job = %job,
                        error = %e,
                        "Index rebuild failed; previous snapshot remains active"
                    );
                }
            }
            state.rebuild_in_progress.store(false, Ordering::SeqCst);
        });
        Ok(job)
    }

    async fn rebuild_once(&self) -> Result<usize> {
        // A failed reload must not clear the catalog being served.
        let catalog = Catalog::load(&self.config.catalog_path)?;
        let embedder = self
            .embedder
            .as_ref()
            .cloned()
            .ok_or_else(|| AppError::Embedding("no encoder available".to_string()))?;

        let build_catalog = catalog.clone();
        let vector_index = tokio::task::spawn_blocking(move || {
            VectorIndex::build(&build_catalog, embedder.as_ref())
        })
        .await
        .map_err(|e| AppError::Embedding(format!("rebuild task failed: {}", e)))??;

        index::save_vector_index(
            &vector_index,
            &self.config.index_path(),
            &self.config.mapping_path(),
        )?;

        let tools = catalog.len();
        self.install_snapshot(SearchSnapshot {
            catalog,
            vector: Some(vector_index),
        });
        Ok(tools)
    }
}
