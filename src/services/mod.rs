pub mod destination_store;
pub mod embedding_table;
pub mod recommendation;

// Re-export public types
pub use destination_store::DestinationStore;
pub use embedding_table::EmbeddingTable;
pub use recommendation::RecommendationService;
