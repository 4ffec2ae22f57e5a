//! In-memory vector index with exact cosine scoring.
//!
//! Insertion-ordered, so equal-distance candidates keep a stable order.
//! Used by tests and embedded deployments; `get` with a filter scans the
//! whole store (O(index size), the documented fallback cost for
//! delete-by-source).

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;
use tracing::trace;

use crate::chunk::MetadataFilter;
use crate::errors::RetrievalError;
use crate::index::{IndexFuture, IndexedPoint, PointSelector, QueryMatch, StoredPoint, VectorIndex};

#[derive(Clone, Debug)]
struct MemoryPoint {
    id: String,
    vector: Vec<f32>,
    document: String,
    metadata: BTreeMap<String, Value>,
}

/// Simple exact-scan index held in process memory.
#[derive(Default)]
pub struct MemoryIndex {
    points: RwLock<Vec<MemoryPoint>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance `1 - cos(a, b)`; zero-norm vectors are treated as
/// maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl VectorIndex for MemoryIndex {
    fn upsert<'a>(&'a self, points: Vec<IndexedPoint>) -> IndexFuture<'a, ()> {
        Box::pin(async move {
            let mut store = self.points.write().expect("index lock poisoned");
            for p in points {
                let incoming = MemoryPoint {
                    id: p.id,
                    vector: p.vector,
                    document: p.document,
                    metadata: p.metadata,
                };
                // Overwrite in place to keep the original insertion slot.
                match store.iter_mut().find(|e| e.id == incoming.id) {
                    Some(slot) => *slot = incoming,
                    None => store.push(incoming),
                }
            }
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&'a MetadataFilter>,
    ) -> IndexFuture<'a, Vec<QueryMatch>> {
        Box::pin(async move {
            let store = self.points.read().expect("index lock poisoned");
            let mut matches: Vec<QueryMatch> = store
                .iter()
                .filter(|p| filter.map(|f| f.matches(&p.metadata)).unwrap_or(true))
                .map(|p| QueryMatch {
                    id: p.id.clone(),
                    distance: cosine_distance(&vector, &p.vector),
                    document: p.document.clone(),
                    metadata: p.metadata.clone(),
                })
                .collect();

            // Stable: equal distances keep insertion order.
            matches.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            matches.truncate(k);
            trace!("MemoryIndex::query k={k} hits={}", matches.len());
            Ok(matches)
        })
    }

    fn get<'a>(&'a self, selector: PointSelector) -> IndexFuture<'a, Vec<StoredPoint>> {
        Box::pin(async move {
            let store = self.points.read().expect("index lock poisoned");
            let out = match selector {
                PointSelector::Ids(ids) => store
                    .iter()
                    .filter(|p| ids.iter().any(|id| *id == p.id))
                    .map(to_stored)
                    .collect(),
                PointSelector::Filter(filter) => store
                    .iter()
                    .filter(|p| filter.matches(&p.metadata))
                    .map(to_stored)
                    .collect(),
            };
            Ok(out)
        })
    }

    fn delete<'a>(&'a self, ids: Vec<String>) -> IndexFuture<'a, ()> {
        Box::pin(async move {
            let mut store = self.points.write().expect("index lock poisoned");
            store.retain(|p| !ids.iter().any(|id| *id == p.id));
            Ok(())
        })
    }

    fn count<'a>(&'a self) -> IndexFuture<'a, usize> {
        Box::pin(async move {
            let store = self.points.read().expect("index lock poisoned");
            Ok::<usize, RetrievalError>(store.len())
        })
    }
}

fn to_stored(p: &MemoryPoint) -> StoredPoint {
    StoredPoint {
        id: p.id.clone(),
        document: p.document.clone(),
        metadata: p.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>) -> IndexedPoint {
        IndexedPoint {
            id: id.to_string(),
            vector,
            document: format!("doc {id}"),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![point("a", vec![1.0, 0.0])]).await.unwrap();
        idx.upsert(vec![point("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);

        let got = idx.get(PointSelector::Ids(vec!["a".into()])).await.unwrap();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn query_orders_by_distance() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![
            point("far", vec![0.0, 1.0]),
            point("near", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let hits = idx.query(vec![1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn equal_distances_keep_insertion_order() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![
            point("first", vec![1.0, 0.0]),
            point("second", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let hits = idx.query(vec![1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
    }

    #[tokio::test]
    async fn delete_removes_points() {
        let idx = MemoryIndex::new();
        idx.upsert(vec![point("a", vec![1.0]), point("b", vec![0.5])])
            .await
            .unwrap();
        idx.delete(vec!["a".into()]).await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);
    }
}
