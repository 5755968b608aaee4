//! Bounded in-memory cache of text embeddings with FIFO eviction.
//!
//! Keys are a 32-bit polynomial hash of the exact input text (`text_<hash>`).
//! Distinct texts can collide on the same key, in which case a lookup returns
//! the vector cached for the other text. This is a known limitation of the
//! weak key; the cache does not store or compare the original text.

use super::Embedding;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Derive the cache key for a piece of text.
///
/// Hashes UTF-16 code units with `h = h * 31 + c` in wrapping 32-bit
/// arithmetic, so keys are stable across processes and platforms.
pub fn cache_key(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32));
    format!("text_{}", hash)
}

struct CacheState {
    entries: HashMap<String, Embedding>,
    insertion_order: VecDeque<String>,
}

pub struct EmbeddingCache {
    max_size: usize,
    state: Mutex<CacheState>,
}

impl EmbeddingCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(max_size),
                insertion_order: VecDeque::with_capacity(max_size),
            }),
        }
    }

    pub fn get(&self, text: &str) -> Option<Embedding> {
        self.get_by_key(&cache_key(text))
    }

    /// Lookups never change eviction order.
    pub fn get_by_key(&self, key: &str) -> Option<Embedding> {
        let state = self.state.lock().ok()?;
        state.entries.get(key).cloned()
    }

    pub fn put(&self, text: &str, embedding: Embedding) {
        self.put_by_key(cache_key(text), embedding);
    }

    /// Insert a vector. Replacing an existing key keeps its original position;
    /// a new key evicts the oldest-inserted entry once the cache is full.
    pub fn put_by_key(&self, key: String, embedding: Embedding) {
        if self.max_size == 0 {
            return;
        }

        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = embedding;
            return;
        }

        if state.entries.len() >= self.max_size {
            if let Some(oldest) = state.insertion_order.pop_front() {
                state.entries.remove(&oldest);
                debug!("Evicted embedding cache entry {}", oldest);
            }
        }

        state.insertion_order.push_back(key.clone());
        state.entries.insert(key, embedding);
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
