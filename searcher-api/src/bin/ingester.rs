use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use searcher_api::config;
use searcher_api::ingest::{
    IngestCoordinator, MongoAnalyzerRepository, NotificationHandler, StreamConsumer,
};
use searcher_api::search::repository::{articles_mappings, ElasticDocumentStore};
use searcher_api::search::{DocumentStore, ARTICLES_INDEX};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = config::read_config().context("failed to read configuration")?;

    let store = ElasticDocumentStore::connect(&settings.elastic, settings.embeddings.dimension)?;
    store
        .assert_index(
            ARTICLES_INDEX,
            articles_mappings(settings.embeddings.dimension),
        )
        .await?;

    let analyzer = MongoAnalyzerRepository::connect(&settings.mongo).await?;
    let handler: Arc<dyn NotificationHandler> =
        Arc::new(IngestCoordinator::new(analyzer, store));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let consumer = StreamConsumer::new(&settings.redis)?;
    consumer.run(handler, shutdown_rx).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
