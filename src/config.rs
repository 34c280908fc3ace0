use std::env;
use std::path::PathBuf;

/// Candidate-generation strategy for the smart recommendation flow.
/// Exactly one strategy is active at a time; quick-search mode always
/// uses the lexical scorer regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Embed the query and search the flat vector index (k nearest).
    Vector,
    /// Weighted substring scoring over the catalog (top 3).
    Lexical,
}

impl RetrievalStrategy {
    pub fn from_env() -> Self {
        match env::var("RETRIEVAL_STRATEGY")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "lexical" | "keyword" => Self::Lexical,
            _ => Self::Vector,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path to the tool catalog JSON (array of tool objects).
    pub catalog_path: PathBuf,
    /// Directory holding the vector index artifact and its identity map.
    pub index_dir: PathBuf,
    pub encoder_model_path: PathBuf,
    pub encoder_tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    /// ONNX sessions kept in the encoder pool.
    pub encoder_pool_size: usize,
    pub retrieval_strategy: RetrievalStrategy,
    /// Candidates fetched from the vector index before reranking.
    pub retrieval_candidates: usize,
    pub shutdown_timeout_secs: u64,
    /// API key for the reranking/fallback LLM. None disables both calls
    /// (the reranker then returns empty without calling out).
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    /// User id allowed to run `stats` and `rebuild_index` commands.
    pub admin_user_id: Option<i64>,
    /// Optional web-search endpoint for the grounded fallback variant.
    pub search_api_url: Option<String>,
    pub search_api_key: Option<String>,
    /// Trusted domain the fallback web search is scoped to.
    pub search_domain: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            catalog_path: PathBuf::from("./tools.json"),
            index_dir: PathBuf::from("./data"),
            encoder_model_path: PathBuf::from("./models/encoder.onnx"),
            encoder_tokenizer_path: PathBuf::from("./models/tokenizer.json"),
            max_sequence_length: 512,
            encoder_pool_size: 2,
            retrieval_strategy: RetrievalStrategy::Vector,
            retrieval_candidates: 15,
            shutdown_timeout_secs: 30,
            llm_api_key: None,
            llm_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model: "llama3-70b-8192".to_string(),
            admin_user_id: None,
            search_api_url: None,
            search_api_key: None,
            search_domain: "alternativeto.net".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()?,
            catalog_path: env::var("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            index_dir: env::var("INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_dir),
            encoder_model_path: env::var("ENCODER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.encoder_model_path),
            encoder_tokenizer_path: env::var("ENCODER_TOKENIZER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.encoder_tokenizer_path),
            max_sequence_length: env::var("MAX_SEQ_LENGTH")
                .unwrap_or_else(|_| defaults.max_sequence_length.to_string())
                .parse()?,
            encoder_pool_size: env::var("ENCODER_POOL_SIZE")
                .unwrap_or_else(|_| defaults.encoder_pool_size.to_string())
                .parse()?,
            retrieval_strategy: RetrievalStrategy::from_env(),
            retrieval_candidates: env::var("RETRIEVAL_CANDIDATES")
                .unwrap_or_else(|_| defaults.retrieval_candidates.to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| defaults.shutdown_timeout_secs.to_string())
                .parse()?,
            llm_api_key: env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            admin_user_id: env::var("ADMIN_ID").ok().and_then(|s| s.parse().ok()),
            search_api_url: env::var("SEARCH_API_URL").ok().filter(|u| !u.is_empty()),
            search_api_key: env::var("SEARCH_API_KEY").ok().filter(|k| !k.is_empty()),
            search_domain: env::var("SEARCH_DOMAIN").unwrap_or(defaults.search_domain),
        })
    }

    /// Path of the binary vector index artifact.
    pub fn index_path(&self) -> PathBuf {
        self.index_dir.join("tools.index")
    }

    /// Path of the row-to-name identity map written next to the index.
    pub fn mapping_path(&self) -> PathBuf {
        self.index_dir.join("index_to_name.json")
    }
}
