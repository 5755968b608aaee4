use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Embedding provider rate limit exceeded after {attempts} attempts: {message}")]
    RateLimitExceeded { attempts: u32, message: String },

    #[error("Embedding provider unavailable after {attempts} attempts: {message}")]
    TransientProvider { attempts: u32, message: String },

    #[error("Embedding provider rejected the request: {message}")]
    PermanentProvider {
        status: Option<u16>,
        message: String,
    },

    #[error("No recommendations available: {0}")]
    NoResults(String),

    #[error("Failed to load data: {0}")]
    DataLoad(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    /// Short machine-readable name for the error kind, used in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::NotConfigured(_) => "not_configured",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::TransientProvider { .. } => "provider_unavailable",
            ApiError::PermanentProvider { .. } => "provider_rejected",
            ApiError::NoResults(_) => "no_results",
            ApiError::DataLoad(_) => "data_load_error",
            ApiError::SerializationError(_) => "serialization_error",
            ApiError::ConfigurationError(_) => "configuration_error",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// Whether the same request may succeed if the caller tries again later.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimitExceeded { .. } | ApiError::TransientProvider { .. }
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured(_)
            | ApiError::RateLimitExceeded { .. }
            | ApiError::TransientProvider { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigurationError(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
