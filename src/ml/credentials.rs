//! Authentication for the embedding provider.
//!
//! Static keys go out as an `api-key` header. Workload identity uses a bearer
//! token from a [`TokenProvider`]; acquiring and refreshing that token is the
//! provider's job, this module only attaches the value.

use crate::error::{ApiError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token for the Cognitive Services scope.
    async fn token(&self) -> Result<String>;
}

/// Reads a bearer token from a file that an external agent keeps fresh.
pub struct FileTokenProvider {
    path: Option<PathBuf>,
}

impl FileTokenProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn token(&self) -> Result<String> {
        let path = self.path.as_ref().ok_or_else(|| {
            ApiError::NotConfigured(
                "Workload identity selected but AZURE_OPENAI_TOKEN_FILE is not set".to_string(),
            )
        })?;

        let token = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApiError::NotConfigured(format!(
                "Failed to read access token from {}: {}",
                path.display(),
                e
            ))
        })?;

        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::NotConfigured(format!(
                "Access token file {} is empty",
                path.display()
            )));
        }

        Ok(token.to_string())
    }
}

#[derive(Clone)]
pub enum AuthMethod {
    ApiKey(String),
    WorkloadIdentity {
        client_id: String,
        provider: Arc<dyn TokenProvider>,
    },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            AuthMethod::WorkloadIdentity { client_id, .. } => f
                .debug_struct("WorkloadIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

/// A resolved header ready to attach to a request.
#[derive(Clone, PartialEq)]
pub struct AuthHeader {
    pub name: &'static str,
    pub value: String,
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl AuthMethod {
    /// Pick the auth method from config: a static key wins, then workload identity.
    pub fn select(
        api_key: Option<&str>,
        client_id: Option<&str>,
        provider: impl FnOnce() -> Arc<dyn TokenProvider>,
    ) -> Option<Self> {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            return Some(AuthMethod::ApiKey(key.to_string()));
        }
        client_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| AuthMethod::WorkloadIdentity {
                client_id: id.to_string(),
                provider: provider(),
            })
    }

    pub async fn header(&self) -> Result<AuthHeader> {
        match self {
            AuthMethod::ApiKey(key) => Ok(AuthHeader {
                name: "api-key",
                value: key.clone(),
            }),
            AuthMethod::WorkloadIdentity { provider, .. } => {
                let token = provider.token().await?;
                Ok(AuthHeader {
                    name: "Authorization",
                    value: format!("Bearer {}", token),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct StaticTokenProvider(pub String);

#[cfg(test)]
#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
