use crate::error::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DEPLOYMENT: &str = "text-embedding-ada-002";
const DEFAULT_API_VERSION: &str = "2023-05-15";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;
const DEFAULT_MAX_CACHE_SIZE: usize = 100;
const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
const DEFAULT_BUILDER_DELAY_MS: u64 = 1_000;
const DEFAULT_DESTINATIONS_PATH: &str = "data/destinations.json";
const DEFAULT_EMBEDDINGS_PATH: &str = "data/destination-embeddings.json";

/// Raw environment view. `config::Environment` lowercases variable names,
/// so `AZURE_OPENAI_API_KEY` lands in `azure_openai_api_key`.
#[derive(Debug, Default, Deserialize)]
struct EnvSettings {
    host: Option<String>,
    port: Option<u16>,
    azure_openai_endpoint: Option<String>,
    azure_openai_deployment_name: Option<String>,
    azure_openai_embedding_model: Option<String>,
    azure_openai_api_version: Option<String>,
    azure_openai_api_key: Option<String>,
    azure_client_id: Option<String>,
    azure_openai_token_file: Option<PathBuf>,
    request_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    rate_limit_delay_ms: Option<u64>,
    max_concurrent_requests: Option<usize>,
    max_cache_size: Option<usize>,
    destinations_path: Option<PathBuf>,
    destination_embeddings_path: Option<PathBuf>,
    recommendation_limit: Option<usize>,
    builder_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub azure_openai_endpoint: String,
    pub azure_openai_deployment: String,
    pub azure_openai_model: String,
    pub azure_openai_api_version: String,
    pub azure_openai_api_key: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_openai_token_file: Option<PathBuf>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,
    pub max_concurrent_requests: usize,
    pub max_cache_size: usize,
    pub destinations_path: PathBuf,
    pub destination_embeddings_path: PathBuf,
    pub recommendation_limit: usize,
    pub builder_delay: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize::<EnvSettings>()?;

        Ok(Self::from_settings(settings))
    }

    fn from_settings(settings: EnvSettings) -> Self {
        let deployment = non_blank(settings.azure_openai_deployment_name)
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());

        Self {
            host: non_blank(settings.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: settings.port.unwrap_or(DEFAULT_PORT),
            azure_openai_endpoint: settings
                .azure_openai_endpoint
                .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
                .unwrap_or_default(),
            azure_openai_model: non_blank(settings.azure_openai_embedding_model)
                .unwrap_or_else(|| deployment.clone()),
            azure_openai_deployment: deployment,
            azure_openai_api_version: non_blank(settings.azure_openai_api_version)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            azure_openai_api_key: non_blank(settings.azure_openai_api_key),
            azure_client_id: non_blank(settings.azure_client_id),
            azure_openai_token_file: settings
                .azure_openai_token_file
                .filter(|path| !path.as_os_str().is_empty()),
            request_timeout: Duration::from_millis(
                settings
                    .request_timeout_ms
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            max_retries: settings.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay: Duration::from_millis(
                settings.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            rate_limit_delay: Duration::from_millis(
                settings
                    .rate_limit_delay_ms
                    .unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS),
            ),
            max_concurrent_requests: settings
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS)
                .max(1),
            max_cache_size: settings.max_cache_size.unwrap_or(DEFAULT_MAX_CACHE_SIZE),
            destinations_path: settings
                .destinations_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATIONS_PATH)),
            destination_embeddings_path: settings
                .destination_embeddings_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EMBEDDINGS_PATH)),
            recommendation_limit: settings
                .recommendation_limit
                .unwrap_or(DEFAULT_RECOMMENDATION_LIMIT)
                .max(1),
            builder_delay: Duration::from_millis(
                settings.builder_delay_ms.unwrap_or(DEFAULT_BUILDER_DELAY_MS),
            ),
        }
    }

    /// True when either a static key or a workload-identity client id is set.
    pub fn has_auth(&self) -> bool {
        self.azure_openai_api_key.is_some() || self.azure_client_id.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(EnvSettings::default())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3001);
        assert_eq!(config.request_timeout, Duration::from_millis(15_000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(2_000));
        assert_eq!(config.rate_limit_delay, Duration::from_millis(1_000));
        assert_eq!(config.azure_openai_model, config.azure_openai_deployment);
        assert!(!config.has_auth());
    }

    #[test]
    fn test_blank_credentials_count_as_unset() {
        let config = Config::from_settings(EnvSettings {
            azure_openai_api_key: Some("   ".into()),
            azure_client_id: Some("".into()),
            ..Default::default()
        });

        assert!(config.azure_openai_api_key.is_none());
        assert!(config.azure_client_id.is_none());
        assert!(!config.has_auth());
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let config = Config::from_settings(EnvSettings {
            azure_openai_endpoint: Some("https://example.openai.azure.com/".into()),
            azure_client_id: Some("client-123".into()),
            max_concurrent_requests: Some(0),
            ..Default::default()
        });

        assert_eq!(
            config.azure_openai_endpoint,
            "https://example.openai.azure.com"
        );
        assert_eq!(config.max_concurrent_requests, 1);
        assert!(config.has_auth());
    }
}
