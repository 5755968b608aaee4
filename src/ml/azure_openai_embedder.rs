use crate::{
    config::Config,
    error::{ApiError, Result},
    ml::{
        cache_key, AuthHeader, AuthMethod, ConcurrencyGate, Embedding, EmbeddingCache,
        FileTokenProvider, ProviderFailure, RetryPolicy, TokenProvider,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 10;
const MAX_TEXT_PREVIEW_LENGTH: usize = 60;

/// One HTTP round trip to the embeddings endpoint.
///
/// Implementations classify every failure into a [`ProviderFailure`]; retry
/// decisions are made by [`EmbeddingClient`].
#[async_trait]
pub trait EmbeddingTransport: Send + Sync {
    async fn request_embedding(
        &self,
        input: &str,
        auth: &AuthHeader,
        timeout: Duration,
    ) -> std::result::Result<Vec<f32>, ProviderFailure>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Azure OpenAI `/embeddings` over reqwest.
pub struct AzureOpenAiTransport {
    client: Client,
    url: String,
    model: String,
}

impl AzureOpenAiTransport {
    pub fn new(endpoint: &str, deployment: &str, api_version: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECONDS))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: embeddings_url(endpoint, deployment, api_version),
            model: model.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub fn embeddings_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

fn classify_reqwest_error(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout
    } else if err.is_builder() {
        ProviderFailure::InvalidRequest(err.to_string())
    } else {
        ProviderFailure::Network(err.to_string())
    }
}

fn extract_embedding(body: &str) -> std::result::Result<Vec<f32>, ProviderFailure> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderFailure::MalformedResponse(e.to_string()))?;

    let embedding = parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .unwrap_or_default();

    if embedding.is_empty() {
        return Err(ProviderFailure::MalformedResponse(
            "response contained no embedding".to_string(),
        ));
    }

    Ok(embedding)
}

#[async_trait]
impl EmbeddingTransport for AzureOpenAiTransport {
    async fn request_embedding(
        &self,
        input: &str,
        auth: &AuthHeader,
        timeout: Duration,
    ) -> std::result::Result<Vec<f32>, ProviderFailure> {
        let request = EmbeddingRequest {
            input,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.url)
            .header(auth.name, &auth.value)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers();
            let retry_after = super::retry::parse_retry_after(
                headers.get("retry-after-ms").and_then(|v| v.to_str().ok()),
                headers
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
                chrono::Utc::now(),
            );
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::from_status(
                status.as_u16(),
                retry_after,
                body,
            ));
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        extract_embedding(&body)
    }
}

/// Turns text into embedding vectors via the remote provider.
///
/// Lookups go cache first; misses pass through the shared concurrency gate
/// and are retried per the [`RetryPolicy`] while holding the gate slot.
pub struct EmbeddingClient {
    transport: Arc<dyn EmbeddingTransport>,
    auth: Option<AuthMethod>,
    cache: EmbeddingCache,
    gate: ConcurrencyGate,
    retry_policy: RetryPolicy,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(
        transport: Arc<dyn EmbeddingTransport>,
        auth: Option<AuthMethod>,
        cache: EmbeddingCache,
        gate: ConcurrencyGate,
        retry_policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            auth,
            cache,
            gate,
            retry_policy,
            timeout,
        }
    }

    /// Build a client talking to Azure OpenAI with settings from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = AzureOpenAiTransport::new(
            &config.azure_openai_endpoint,
            &config.azure_openai_deployment,
            &config.azure_openai_api_version,
            &config.azure_openai_model,
        )?;

        let token_file = config.azure_openai_token_file.clone();
        let auth = AuthMethod::select(
            config.azure_openai_api_key.as_deref(),
            config.azure_client_id.as_deref(),
            move || Arc::new(FileTokenProvider::new(token_file)) as Arc<dyn TokenProvider>,
        );

        match &auth {
            Some(AuthMethod::ApiKey(_)) => info!("Embedding client using API key authentication"),
            Some(AuthMethod::WorkloadIdentity { client_id, .. }) => info!(
                "Embedding client using workload identity (client id {})",
                client_id
            ),
            None => warn!(
                "No AZURE_OPENAI_API_KEY or AZURE_CLIENT_ID configured; recommendations are disabled"
            ),
        }
        info!(
            "Embedding endpoint: {}, timeout: {}ms, max retries: {}, max concurrent: {}",
            transport.url(),
            config.request_timeout.as_millis(),
            config.max_retries,
            config.max_concurrent_requests
        );

        Ok(Self::new(
            Arc::new(transport),
            auth,
            EmbeddingCache::new(config.max_cache_size),
            ConcurrencyGate::new(config.max_concurrent_requests),
            RetryPolicy::new(
                config.max_retries,
                config.retry_delay,
                config.rate_limit_delay,
            ),
            config.request_timeout,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.auth.is_some()
    }

    /// Embed `text`, consulting the cache before calling out.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "Text to embed cannot be empty".to_string(),
            ));
        }

        let key = cache_key(text);
        if let Some(hit) = self.cache.get_by_key(&key) {
            debug!("Cache hit for text embedding: {}", preview(text));
            return Ok(hit);
        }

        let auth = self.auth.as_ref().ok_or_else(|| {
            ApiError::NotConfigured(
                "No authentication method configured for the embedding provider".to_string(),
            )
        })?;

        let embedding = self
            .gate
            .run(|| self.request_with_retry(text, auth))
            .await?;

        self.cache.put_by_key(key, embedding.clone());
        Ok(embedding)
    }

    async fn request_with_retry(&self, text: &str, auth: &AuthMethod) -> Result<Embedding> {
        debug!(
            "Requesting embedding (length: {}): {}",
            text.len(),
            preview(text)
        );

        let mut retries = 0u32;
        loop {
            let header = auth.header().await?;
            let failure = match self
                .transport
                .request_embedding(text, &header, self.timeout)
                .await
            {
                Ok(vector) => {
                    debug!("Got embedding of size {}", vector.len());
                    return Ok(Arc::from(vector));
                }
                Err(failure) => failure,
            };

            match self.retry_policy.next_delay(retries, &failure) {
                Some(delay) => {
                    retries += 1;
                    warn!(
                        "Embedding request failed ({}); retry {}/{} in {}ms",
                        failure,
                        retries,
                        self.retry_policy.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let attempts = retries + 1;
                    error!(
                        "Embedding request failed after {} attempt(s): {}",
                        attempts, failure
                    );
                    return Err(failure.into_error(attempts));
                }
            }
        }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_PREVIEW_LENGTH {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_TEXT_PREVIEW_LENGTH).collect();
    format!("{}...", head)
}
