//! Precomputed destination embeddings, keyed by destination id.
//!
//! Loaded once at startup. Vectors computed on demand during ranking are
//! added in memory only; the offline builder is the only writer of the file.

use crate::{error::Result, ml::Embedding};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct EmbeddingTable {
    entries: RwLock<HashMap<String, Embedding>>,
}

impl EmbeddingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<f32>)>) -> Self {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(id, vector)| (id, Arc::from(vector)))
                    .collect(),
            ),
        }
    }

    /// Load the persisted table. A missing or unreadable file yields an empty
    /// table so the service can still start and embed on demand.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!(
                "Destination embeddings file {} not found. Recommendations will require real-time embedding generation.",
                path.display()
            );
            return Self::new();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                serde_json::from_str::<HashMap<String, Vec<f32>>>(&data).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(entries) => {
                info!(
                    "Loaded {} destination embeddings from {}",
                    entries.len(),
                    path.display()
                );
                Self::from_entries(entries)
            }
            Err(e) => {
                error!(
                    "Error loading destination embeddings from {}: {}",
                    path.display(),
                    e
                );
                Self::new()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Embedding> {
        self.entries.read().ok()?.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(id))
            .unwrap_or(false)
    }

    pub fn insert(&self, id: &str, embedding: Embedding) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(id.to_string(), embedding);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the whole table as pretty JSON, sorted by id.
    ///
    /// Writes to a sibling temp file first and renames it over `path`, so a
    /// crash mid-write never leaves a truncated table behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot: BTreeMap<String, Embedding> = match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .map(|(id, v)| (id.clone(), v.clone()))
                .collect(),
            Err(_) => BTreeMap::new(),
        };
        let serializable: BTreeMap<&str, &[f32]> = snapshot
            .iter()
            .map(|(id, v)| (id.as_str(), &v[..]))
            .collect();

        let json = serde_json::to_string_pretty(&serializable)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        info!(
            "Wrote {} destination embeddings to {}",
            serializable.len(),
            path.display()
        );
        Ok(())
    }
}
