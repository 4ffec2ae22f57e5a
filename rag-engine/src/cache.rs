//! Time-bounded caches for embeddings and query results.
//!
//! Entries expire lazily: expiry is checked on read, and [`TtlCache::size`]
//! sweeps expired entries as a side effect. There is no eviction beyond
//! TTL, so the map can grow between sweeps; acceptable for the corpus
//! sizes this engine targets.
//!
//! Keys are blake3 hashes of the canonicalized semantic inputs, so
//! distinct inputs cannot collide in practice.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::chunk::RetrievalResult;
use crate::config::SearchOptions;

/// Derives a collision-resistant cache key from the parts of a semantic
/// input tuple. Parts are length-prefixed before hashing so that
/// `("ab","c")` and `("a","bc")` cannot collide.
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for p in parts {
        hasher.update(&(p.len() as u64).to_le_bytes());
        hasher.update(p.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Time-based cache with a fixed TTL per instance.
///
/// Safe for concurrent read-and-insert. A get-miss-then-set race causes
/// at most duplicate computation, not incorrect results.
pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (V, Instant)>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value if present and not expired. Expired entries are
    /// removed on the spot.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut map = self.entries.lock().expect("cache mutex poisoned");
        match map.get(key) {
            Some((_, inserted_at)) if inserted_at.elapsed() > self.ttl => {
                map.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    /// Inserts a value with the current timestamp, replacing any
    /// previous entry for the key.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut map = self.entries.lock().expect("cache mutex poisoned");
        map.insert(key.into(), (value, Instant::now()));
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }

    /// Number of live entries. Sweeps expired entries first.
    pub fn size(&self) -> usize {
        let mut map = self.entries.lock().expect("cache mutex poisoned");
        let ttl = self.ttl;
        map.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= ttl);
        map.len()
    }
}

/// Cache for embedding vectors, keyed by `(text, model)`.
pub struct EmbeddingCache {
    cache: TtlCache<Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(ttl: Duration) -> Self {
        debug!("EmbeddingCache::new ttl={:?}", ttl);
        Self {
            cache: TtlCache::new(ttl),
        }
    }

    fn make_key(text: &str, model: &str) -> String {
        cache_key(&[text, model])
    }

    pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        self.cache.get(&Self::make_key(text, model))
    }

    pub fn set(&self, text: &str, model: &str, embedding: Vec<f32>) {
        self.cache.set(Self::make_key(text, model), embedding);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

/// Cache for retrieval results, keyed by the full query tuple:
/// `(query, top_k, score_threshold, mode, alpha)`.
pub struct QueryCache {
    cache: TtlCache<RetrievalResult>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        debug!("QueryCache::new ttl={:?}", ttl);
        Self {
            cache: TtlCache::new(ttl),
        }
    }

    fn make_key(
        query: &str,
        top_k: usize,
        score_threshold: f32,
        options: &SearchOptions,
    ) -> String {
        let top_k = top_k.to_string();
        let threshold = format!("{score_threshold:.6}");
        let alpha = options
            .alpha
            .map(|a| format!("{a:.6}"))
            .unwrap_or_else(|| "none".to_string());
        cache_key(&[query, &top_k, &threshold, options.mode.as_str(), &alpha])
    }

    pub fn get(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
        options: &SearchOptions,
    ) -> Option<RetrievalResult> {
        self.cache
            .get(&Self::make_key(query, top_k, score_threshold, options))
    }

    pub fn set(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
        options: &SearchOptions,
        result: RetrievalResult,
    ) {
        self.cache
            .set(Self::make_key(query, top_k, score_threshold, options), result);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchMode;
    use std::thread::sleep;

    #[test]
    fn round_trip_and_expiry() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(40));
        cache.set("k", 7);
        assert_eq!(cache.get("k"), Some(7));

        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn size_sweeps_expired_entries() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(40));
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.size(), 2);

        sleep(Duration::from_millis(60));
        cache.set("c", 3);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1);
        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn keys_are_collision_resistant_across_tuple_shapes() {
        assert_ne!(cache_key(&["ab", "c"]), cache_key(&["a", "bc"]));
        assert_ne!(cache_key(&["x"]), cache_key(&["x", ""]));
    }

    #[test]
    fn embedding_cache_keyed_by_text_and_model() {
        let cache = EmbeddingCache::new(Duration::from_secs(60));
        cache.set("hello", "model-a", vec![1.0, 2.0]);
        assert_eq!(cache.get("hello", "model-a"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get("hello", "model-b"), None);
    }

    #[test]
    fn query_cache_keyed_by_full_tuple() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let vector = SearchOptions::default();
        let hybrid = SearchOptions {
            mode: SearchMode::Hybrid,
            alpha: Some(0.5),
        };
        let result = RetrievalResult {
            query: "q".into(),
            chunks: vec![],
            scores: vec![],
            total_results: 0,
        };
        cache.set("q", 5, 0.7, &vector, result);
        assert!(cache.get("q", 5, 0.7, &vector).is_some());
        assert!(cache.get("q", 5, 0.7, &hybrid).is_none());
        assert!(cache.get("q", 10, 0.7, &vector).is_none());
        assert!(cache.get("q", 5, 0.2, &vector).is_none());
    }
}
