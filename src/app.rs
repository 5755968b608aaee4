use crate::{
    config::Config,
    error::Result,
    ml::EmbeddingClient,
    routes::api_routes,
    services::{DestinationStore, EmbeddingTable, RecommendationService},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{info, warn};
use std::net::TcpListener;
use std::sync::Arc;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener).await
    }

    /// Wire the recommendation service from configuration.
    pub fn build_service(config: &Config) -> Result<RecommendationService> {
        let destinations = DestinationStore::load(&config.destinations_path)?;
        let embeddings = EmbeddingTable::load(&config.destination_embeddings_path);
        let embedder = EmbeddingClient::from_config(config)?;

        if config.azure_openai_endpoint.is_empty() {
            warn!("AZURE_OPENAI_ENDPOINT is not set; embedding requests will fail");
        }
        let missing = destinations
            .all()
            .iter()
            .filter(|d| !embeddings.contains(&d.id))
            .count();
        if missing > 0 {
            warn!(
                "{} of {} destinations have no precomputed embedding and will be embedded on demand",
                missing,
                destinations.len()
            );
        }

        Ok(RecommendationService::new(
            Arc::new(embedder),
            Arc::new(destinations),
            Arc::new(embeddings),
            config.recommendation_limit,
        ))
    }

    /// Serve on an already-bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let recommendation_service = web::Data::new(Self::build_service(&self.config)?);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
