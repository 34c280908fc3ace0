//! Offline vector-index build.
//!
//! Loads the catalog, embeds every record with the sentence encoder,
//! and writes the index artifact plus its identity map. The service
//! loads both at startup; running this again after editing the catalog
//! is equivalent to the admin `rebuild_index` command.

use toolrec::embedding::SentenceEncoder;
use toolrec::index::{self, VectorIndex};
use toolrec::{Catalog, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolrec=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let catalog = Catalog::load(&config.catalog_path)?;
    tracing::info!(tools = catalog.len(), "Catalog loaded, building index");

    let encoder = SentenceEncoder::load(
        &config.encoder_model_path,
        &config.encoder_tokenizer_path,
        config.max_sequence_length,
        1,
    )?;

    let start = std::time::Instant::now();
    let vector_index = VectorIndex::build(&catalog, &encoder)?;
    tracing::info!(
        rows = vector_index.index.rows(),
        dim = vector_index.index.dim(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Embeddings computed"
    );

    index::save_vector_index(&vector_index, &config.index_path(), &config.mapping_path())?;

    tracing::info!(
        index = %config.index_path().display(),
        mapping = %config.mapping_path().display(),
        "Index build complete"
    );
    Ok(())
}
