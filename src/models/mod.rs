use serde::{Deserialize, Serialize};

pub use destination::{Destination, ScoredDestination};

mod destination;

#[cfg(test)]
pub(crate) use destination::test_destination;

/// Request body for a single best-match recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    /// Free-text travel preferences, e.g. "relaxing beach vacation"
    #[serde(default)]
    pub user_input: Option<String>,
}

/// Request body for a ranked list of recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopRecommendationsRequest {
    #[serde(default)]
    pub user_input: Option<String>,
    /// Number of destinations to return; falls back to the configured default
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response structure for ranked recommendations
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<ScoredDestination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
}
