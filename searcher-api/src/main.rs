use anyhow::Context;
use tracing_subscriber::EnvFilter;

use searcher_api::search::embedder::MiniLmEmbedder;
use searcher_api::search::repository::ElasticDocumentStore;
use searcher_api::search::{schema, Embedder, SearchService};
use searcher_api::{config, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = config::read_config().context("failed to read configuration")?;
    schema::verify_tables().map_err(anyhow::Error::msg)?;

    let model_path = settings.embeddings.require_model_path()?;
    let embedder = MiniLmEmbedder::load(model_path)?;
    anyhow::ensure!(
        embedder.dimensions() == settings.embeddings.dimension,
        "embedding model produces {} dimensions, configuration expects {}",
        embedder.dimensions(),
        settings.embeddings.dimension,
    );

    let store = ElasticDocumentStore::connect(&settings.elastic, settings.embeddings.dimension)?;
    store.assert_indices().await?;

    let state = AppState::new(SearchService::new(embedder, store));
    let app = router::create(state, &settings.cors)?;

    let listener = tokio::net::TcpListener::bind((
        settings.application.host.as_str(),
        settings.application.port,
    ))
    .await
    .context("failed to bind listener")?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
