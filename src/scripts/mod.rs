pub mod build_embeddings;

pub use build_embeddings::{build_embeddings, progress_bar, BuildReport};
