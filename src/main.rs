use std::sync::Arc;

use anyhow::Result;

use mineral_rag::models::Environment;
use mineral_rag::rag::embeddings::build_embedder;
use mineral_rag::rag::generation::{ChatCompletionsGenerator, Generator};
use mineral_rag::routes::{self, AppState};
use mineral_rag::{BulkLoader, RagEngine, Settings, StoreRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::load()?);
    mineral_rag::init_tracing();

    tracing::info!("Embedding provider: {:?}", settings.embedding.provider);
    tracing::info!("Generation endpoint: {}", settings.generation.api_base);

    let embedder = build_embedder(&settings.embedding)?;
    let registry = Arc::new(StoreRegistry::new(settings.clone(), embedder));

    // production is opened eagerly so a bad store config fails at boot
    registry.open_store(Environment::Production).await?;

    let generator = ChatCompletionsGenerator::new(&settings.generation)?;
    match generator.health_check().await {
        Ok(true) => tracing::info!("Generation endpoint is healthy"),
        Ok(false) | Err(_) => tracing::warn!("Generation endpoint is not reachable (continuing)"),
    }

    let engine = Arc::new(RagEngine::new(
        registry.clone(),
        Arc::new(generator),
        settings.generation.clone(),
    ));
    let loader = Arc::new(BulkLoader::new(registry, settings.loader.catalog_path.clone()));

    let app = routes::router(Arc::new(AppState { engine, loader }));

    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    tracing::info!("mineral-rag listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
