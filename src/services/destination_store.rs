use crate::{
    error::{ApiError, Result},
    models::Destination,
};
use std::path::Path;
use tracing::info;

/// Read-only destination catalogue, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct DestinationStore {
    destinations: Vec<Destination>,
}

impl DestinationStore {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ApiError::DataLoad(format!(
                "Failed to read destinations from {}: {}",
                path.display(),
                e
            ))
        })?;

        let destinations: Vec<Destination> = serde_json::from_str(&data).map_err(|e| {
            ApiError::DataLoad(format!(
                "Failed to parse destinations in {}: {}",
                path.display(),
                e
            ))
        })?;

        info!(
            "Loaded {} destinations from {}",
            destinations.len(),
            path.display()
        );
        Ok(Self::new(destinations))
    }

    /// All destinations in data-set order.
    pub fn all(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}
