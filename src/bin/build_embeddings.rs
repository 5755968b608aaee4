//! Precompute destination embeddings and write them to
//! `DESTINATION_EMBEDDINGS_PATH`.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_recommender_api::{
    ml::EmbeddingClient,
    scripts::{build_embeddings, progress_bar},
    services::{DestinationStore, EmbeddingTable},
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travel_recommender_api=info,build_embeddings=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    if !config.has_auth() {
        anyhow::bail!("Set AZURE_OPENAI_API_KEY or AZURE_CLIENT_ID before generating embeddings");
    }

    let destinations = DestinationStore::load(&config.destinations_path)
        .context("Failed to load destinations")?;
    let table = EmbeddingTable::load(&config.destination_embeddings_path);
    let client = EmbeddingClient::from_config(&config).context("Failed to build embedding client")?;

    let progress = progress_bar(destinations.len());
    let report = build_embeddings(
        &client,
        &destinations,
        &table,
        &config.destination_embeddings_path,
        config.builder_delay,
        &progress,
    )
    .await
    .context("Embedding generation failed")?;

    info!(
        "Embeddings file at {} ({} generated, {} failed)",
        config.destination_embeddings_path.display(),
        report.generated,
        report.failed
    );
    Ok(())
}
