use log::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use travel_recommender_api::{app::Application, Config, Result};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("travel_recommender_api=info,actix_web=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    info!(
        "Embedding deployment {} (max {} concurrent requests, cache of {})",
        config.azure_openai_deployment, config.max_concurrent_requests, config.max_cache_size
    );

    Application::new(&config).run().await
}
