pub mod azure_openai_embedder;
pub mod concurrency_gate;
pub mod credentials;
pub mod embedding_cache;
pub mod retry;
pub mod similarity;

use std::sync::Arc;

/// An embedding vector; immutable once produced and cheap to share.
pub type Embedding = Arc<[f32]>;

pub use azure_openai_embedder::{
    embeddings_url, AzureOpenAiTransport, EmbeddingClient, EmbeddingTransport,
};
pub use concurrency_gate::ConcurrencyGate;
pub use credentials::{AuthHeader, AuthMethod, FileTokenProvider, TokenProvider};
pub use embedding_cache::{cache_key, EmbeddingCache};
pub use retry::{ProviderFailure, RetryPolicy};
pub use similarity::cosine_similarity;

#[cfg(test)]
pub(crate) use credentials::StaticTokenProvider;
