//! Vector index capability interface.
//!
//! The engine talks to the index only through [`VectorIndex`], so the
//! backing store (Qdrant, in-memory) is chosen at construction time.
//! Distances are **cosine distances** (0 = identical); the engine
//! converts them to similarity scores.

use std::collections::BTreeMap;
use std::{future::Future, pin::Pin};

use serde_json::Value;

use crate::chunk::MetadataFilter;
use crate::errors::RetrievalError;

/// Boxed future returned by index methods.
pub type IndexFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RetrievalError>> + Send + 'a>>;

/// A point to upsert: id, vector, raw document text and metadata.
#[derive(Clone, Debug)]
pub struct IndexedPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: BTreeMap<String, Value>,
}

/// One nearest-neighbor match returned by a query.
#[derive(Clone, Debug)]
pub struct QueryMatch {
    pub id: String,
    /// Cosine distance to the query vector (lower = closer).
    pub distance: f32,
    pub document: String,
    pub metadata: BTreeMap<String, Value>,
}

/// A stored point fetched by id or filter (no distance attached).
#[derive(Clone, Debug)]
pub struct StoredPoint {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, Value>,
}

/// Selector for [`VectorIndex::get`].
#[derive(Clone, Debug)]
pub enum PointSelector {
    /// Fetch specific ids.
    Ids(Vec<String>),
    /// Fetch every point matching a metadata filter.
    Filter(MetadataFilter),
}

/// Capability interface over a vector store.
///
/// Implementations must be safe for concurrent reads; the engine
/// serializes writes itself.
pub trait VectorIndex: Send + Sync {
    /// Inserts or overwrites points keyed by id. Idempotent: re-adding
    /// an existing id overwrites rather than duplicates.
    fn upsert<'a>(&'a self, points: Vec<IndexedPoint>) -> IndexFuture<'a, ()>;

    /// Returns up to `k` nearest neighbors by cosine distance, closest
    /// first; ties resolve to insertion order. `filter` restricts
    /// candidates by metadata equality.
    fn query<'a>(
        &'a self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&'a MetadataFilter>,
    ) -> IndexFuture<'a, Vec<QueryMatch>>;

    /// Fetches stored points by ids or metadata filter.
    fn get<'a>(&'a self, selector: PointSelector) -> IndexFuture<'a, Vec<StoredPoint>>;

    /// Deletes points by id. Unknown ids are ignored.
    fn delete<'a>(&'a self, ids: Vec<String>) -> IndexFuture<'a, ()>;

    /// Number of stored points.
    fn count<'a>(&'a self) -> IndexFuture<'a, usize>;
}

pub mod memory;
pub mod qdrant;
