use anyhow::Result;
use bearmobile_api::ApiServer;
use bearmobile_core::{
    prompt::load_system_prompt,
    providers::{ProviderFactory, ProviderKeys},
    tools::{fetch_stores_by_prefecture::load_stores_csv, support_tools},
    SupportCore,
};
use bearmobile_knowledge::{Cache, Embedder, HashingEmbedder, OpenAiEmbedder, VectorStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod settings;

use settings::{AppConfig, EmbeddingBackend, DEFAULT_CONFIG_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bearmobile=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BearMobile customer support...");

    dotenv::dotenv().ok();
    let config = AppConfig::load(DEFAULT_CONFIG_FILE)?;

    let system_prompt = load_system_prompt(&config.paths.system_prompt).await?;
    let keys = ProviderKeys::from_env();

    let embedder: Arc<dyn Embedder> = match config.embedding {
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(keys.openai.clone())),
        EmbeddingBackend::Hashing => {
            warn!("Using local hashing embeddings; the QA index must be built the same way");
            Arc::new(HashingEmbedder::default())
        }
    };

    let qa_index = if VectorStore::exists_at(&config.paths.qa_index).await {
        VectorStore::load_local(&config.paths.qa_index).await?
    } else {
        warn!(
            "No QA index at {}; run build-qa-index first. FAQ lookups will return nothing",
            config.paths.qa_index
        );
        VectorStore::new()
    };

    let stores = match load_stores_csv(&config.paths.stores_csv) {
        Ok(stores) => stores,
        Err(e) => {
            warn!("Store list unavailable, store lookups will return nothing: {:#}", e);
            Vec::new()
        }
    };

    let cache = Arc::new(Cache::open(embedder.clone(), config.core.cache.clone()).await?);
    info!("Semantic cache loaded with {} entries", cache.len().await);

    let tools = support_tools(
        Arc::new(qa_index),
        embedder,
        stores,
        config.core.qa_search_limit,
    );
    let model_factory = Arc::new(ProviderFactory::new(keys, config.core.temperature));

    let core = Arc::new(SupportCore::new(
        config.core,
        cache,
        tools,
        system_prompt,
        model_factory,
    )?);

    let server = ApiServer::new(config.api, core);
    server.start().await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
