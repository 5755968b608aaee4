use crate::{
    error::{ApiError, Result},
    ml::{cosine_similarity, Embedding, EmbeddingClient},
    models::{Destination, ScoredDestination},
    services::{DestinationStore, EmbeddingTable},
};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed framing applied to the user's text before it is embedded.
const QUERY_TEMPLATE_PREFIX: &str =
    "I'm looking for a travel destination that matches these preferences: ";

pub fn enrich_query(user_input: &str) -> String {
    format!("{}{}", QUERY_TEMPLATE_PREFIX, user_input.trim())
}

/// Why a single candidate dropped out of a ranking pass.
#[derive(Debug)]
enum CandidateFailure {
    Embedding(ApiError),
    DimensionMismatch { expected: usize, actual: usize },
    NonFiniteScore,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateFailure::Embedding(e) => write!(f, "{}", e),
            CandidateFailure::DimensionMismatch { expected, actual } => write!(
                f,
                "embedding has {} dimensions, query has {}",
                actual, expected
            ),
            CandidateFailure::NonFiniteScore => write!(f, "similarity is not a finite number"),
        }
    }
}

type CandidateOutcome<'a> = (&'a Destination, std::result::Result<f32, CandidateFailure>);

#[derive(Clone)]
pub struct RecommendationService {
    embedder: Arc<EmbeddingClient>,
    destinations: Arc<DestinationStore>,
    embeddings: Arc<EmbeddingTable>,
    default_limit: usize,
}

impl RecommendationService {
    pub fn new(
        embedder: Arc<EmbeddingClient>,
        destinations: Arc<DestinationStore>,
        embeddings: Arc<EmbeddingTable>,
        default_limit: usize,
    ) -> Self {
        Self {
            embedder,
            destinations,
            embeddings,
            default_limit: default_limit.max(1),
        }
    }

    /// Whether an authentication method for the embedding provider is configured.
    pub fn is_ready(&self) -> bool {
        self.embedder.is_configured()
    }

    /// Best single match for the user's preferences.
    pub async fn recommend_best(&self, user_input: &str) -> Result<ScoredDestination> {
        self.recommend(user_input, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NoResults("No destinations could be scored".to_string()))
    }

    /// Rank destinations by similarity to `user_input`, most similar first.
    ///
    /// Candidates whose embedding cannot be produced are skipped; the call only
    /// fails with `NoResults` when none of them could be scored.
    pub async fn recommend(
        &self,
        user_input: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredDestination>> {
        if user_input.trim().is_empty() {
            return Err(ApiError::InvalidInput("User input is required".to_string()));
        }
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(ApiError::InvalidInput("Limit must be at least 1".to_string()));
        }
        if !self.is_ready() {
            return Err(ApiError::NotConfigured(
                "Set AZURE_OPENAI_API_KEY or AZURE_CLIENT_ID to enable recommendations"
                    .to_string(),
            ));
        }

        info!(
            "Generating recommendations for input of {} chars (limit {})",
            user_input.len(),
            limit
        );

        let user_embedding = self.embedder.embed(&enrich_query(user_input)).await?;

        let outcomes = self.score_candidates(&user_embedding).await;
        let total = outcomes.len();

        let mut scored = Vec::with_capacity(total);
        let mut failed = 0usize;
        for (destination, outcome) in outcomes {
            match outcome {
                Ok(similarity) => {
                    scored.push(ScoredDestination::new(destination.clone(), similarity))
                }
                Err(reason) => {
                    failed += 1;
                    warn!(
                        "Skipping destination {} ({}, {}): {}",
                        destination.id, destination.city, destination.country, reason
                    );
                }
            }
        }

        if scored.is_empty() {
            return Err(ApiError::NoResults(format!(
                "none of {} destinations produced a usable embedding",
                total
            )));
        }
        if failed > 0 {
            warn!("{} of {} destinations skipped during ranking", failed, total);
        }

        // Stable sort keeps data-set order among equal scores.
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(limit);

        if let Some(top) = scored.first() {
            info!(
                "Top recommendation: {}, {} ({}% match)",
                top.destination.city, top.destination.country, top.match_percentage
            );
        }

        Ok(scored)
    }

    async fn score_candidates(&self, user_embedding: &[f32]) -> Vec<CandidateOutcome<'_>> {
        let futures = self.destinations.all().iter().map(|destination| async move {
            let outcome = match self.candidate_embedding(destination).await {
                Ok(candidate) => score(user_embedding, &candidate),
                Err(e) => Err(CandidateFailure::Embedding(e)),
            };
            (destination, outcome)
        });

        join_all(futures).await
    }

    /// Precomputed vector if present, otherwise embed the destination's
    /// description and remember it for the rest of the process lifetime.
    async fn candidate_embedding(&self, destination: &Destination) -> Result<Embedding> {
        if let Some(embedding) = self.embeddings.get(&destination.id) {
            return Ok(embedding);
        }

        debug!(
            "No precomputed embedding for {}, generating on demand",
            destination.id
        );
        let embedding = self.embedder.embed(&destination.embedding_text()).await?;
        self.embeddings.insert(&destination.id, embedding.clone());
        Ok(embedding)
    }
}

fn score(user: &[f32], candidate: &[f32]) -> std::result::Result<f32, CandidateFailure> {
    if user.len() != candidate.len() {
        return Err(CandidateFailure::DimensionMismatch {
            expected: user.len(),
            actual: candidate.len(),
        });
    }
    let similarity = cosine_similarity(user, candidate);
    if !similarity.is_finite() {
        return Err(CandidateFailure::NonFiniteScore);
    }
    Ok(similarity)
}
