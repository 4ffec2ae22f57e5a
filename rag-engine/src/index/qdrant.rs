//! Qdrant implementation of the vector index capability.
//!
//! Thin adapter around `qdrant-client` that concentrates all Qdrant
//! interactions behind [`VectorIndex`], hiding the verbose builder
//! pattern from the rest of the engine.
//!
//! Point ids are deterministic UUIDv5 values derived from the chunk id,
//! so re-upserting a chunk overwrites its point. The original chunk id
//! is kept in the payload under `chunk_id`.

use std::collections::BTreeMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    FieldCondition, Filter, ListValue, Match, PointId, PointStruct, PointsIdsList,
    ScrollPointsBuilder, SearchPointsBuilder, Struct, UpsertPointsBuilder, Value as QValue, Vector,
    VectorParamsBuilder, Vectors, condition::ConditionOneOf, value, vectors,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::MetadataFilter;
use crate::config::{DistanceKind, VectorSpace};
use crate::errors::RetrievalError;
use crate::index::{IndexFuture, IndexedPoint, PointSelector, QueryMatch, StoredPoint, VectorIndex};

/// Connection settings for a Qdrant-backed index.
#[derive(Clone, Debug)]
pub struct QdrantIndexConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334`.
    pub url: String,
    /// Optional API key for Qdrant Cloud.
    pub api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Distance function for the collection's vector space.
    pub distance: DistanceKind,
}

/// Qdrant-backed [`VectorIndex`].
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    distance: DistanceKind,
}

impl QdrantIndex {
    /// Creates a new index client from the given configuration.
    ///
    /// # Errors
    /// Returns `RetrievalError::Index` if the client initialization fails.
    pub fn new(cfg: &QdrantIndexConfig) -> Result<Self, RetrievalError> {
        if cfg.url.trim().is_empty() {
            return Err(RetrievalError::Config("qdrant url is empty".into()));
        }

        let mut builder = Qdrant::from_url(&cfg.url);
        if let Some(key) = &cfg.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
        })
    }

    /// Ensures that the collection exists in Qdrant.
    ///
    /// - If the collection already exists → no-op.
    /// - If missing → creates it with the given vector space configuration.
    pub async fn ensure_collection(&self, space: &VectorSpace) -> Result<(), RetrievalError> {
        info!(
            "Ensuring collection '{}' with size={} distance={:?}",
            self.collection, space.size, self.distance
        );

        match self.client.collection_info(&self.collection).await {
            Ok(_) => {
                debug!("Collection '{}' already exists", self.collection);
                return Ok(());
            }
            Err(err) => {
                warn!(
                    "Collection '{}' not found, will be created (error={})",
                    self.collection, err
                );
            }
        }

        let distance = match self.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(space.size as u64, distance)),
            )
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        info!("Collection '{}' created successfully", self.collection);
        Ok(())
    }

    async fn scroll_points(
        &self,
        filter: Option<Filter>,
    ) -> Result<Vec<StoredPoint>, RetrievalError> {
        let mut out = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(256)
                .with_payload(true);
            if let Some(f) = filter.clone() {
                builder = builder.filter(f);
            }
            if let Some(off) = offset.clone() {
                builder = builder.offset(off);
            }

            let resp = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| RetrievalError::Index(e.to_string()))?;

            for point in resp.result {
                let payload = qpayload_to_metadata(point.payload);
                out.push(stored_from_payload(payload));
            }

            match resp.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(out)
    }
}

impl VectorIndex for QdrantIndex {
    fn upsert<'a>(&'a self, points: Vec<IndexedPoint>) -> IndexFuture<'a, ()> {
        Box::pin(async move {
            if points.is_empty() {
                debug!("No points provided for upsert");
                return Ok(());
            }

            info!(
                "Upserting {} points into collection '{}'",
                points.len(),
                self.collection
            );

            let structs: Vec<PointStruct> = points
                .into_iter()
                .map(|p| {
                    let mut payload: std::collections::HashMap<String, QValue> =
                        std::collections::HashMap::new();
                    payload.insert("content".into(), qstring(&p.document));
                    payload.insert("chunk_id".into(), qstring(&p.id));
                    for (k, v) in p.metadata {
                        payload.insert(k, json_to_qvalue(v));
                    }

                    let pid: PointId = stable_point_uuid(&p.id).into();
                    let vectors = Vectors {
                        vectors_options: Some(vectors::VectorsOptions::Vector(Vector {
                            data: p.vector,
                            ..Default::default()
                        })),
                    };

                    PointStruct {
                        id: Some(pid),
                        payload,
                        vectors: Some(vectors),
                        ..Default::default()
                    }
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, structs))
                .await
                .map_err(|e| RetrievalError::Index(e.to_string()))?;

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
            debug!(
                "Searching in '{}' with top_k={} filtered={}",
                self.collection,
                k,
                filter.is_some()
            );

            let mut builder =
                SearchPointsBuilder::new(&self.collection, vector, k as u64).with_payload(true);
            if let Some(f) = filter {
                builder = builder.filter(to_qdrant_filter(f));
            }

            let res = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| RetrievalError::Index(e.to_string()))?;

            let mut out = Vec::with_capacity(res.result.len());
            for r in res.result.into_iter() {
                // Qdrant reports cosine *similarity*; the trait contract
                // is cosine distance.
                let distance = 1.0 - r.score;
                let payload = qpayload_to_metadata(r.payload);
                let stored = stored_from_payload(payload);
                out.push(QueryMatch {
                    id: stored.id,
                    distance,
                    document: stored.document,
                    metadata: stored.metadata,
                });
            }

            debug!("Search completed: {} hits returned", out.len());
            Ok(out)
        })
    }

    fn get<'a>(&'a self, selector: PointSelector) -> IndexFuture<'a, Vec<StoredPoint>> {
        Box::pin(async move {
            match selector {
                PointSelector::Ids(ids) => {
                    // `should` = any-of over the requested chunk ids.
                    let filter = Filter {
                        should: ids
                            .iter()
                            .filter_map(|id| {
                                equality_condition("chunk_id", &Value::String(id.clone()))
                            })
                            .collect(),
                        ..Default::default()
                    };
                    self.scroll_points(Some(filter)).await
                }
                PointSelector::Filter(filter) => {
                    self.scroll_points(Some(to_qdrant_filter(&filter))).await
                }
            }
        })
    }

    fn delete<'a>(&'a self, ids: Vec<String>) -> IndexFuture<'a, ()> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let point_ids: Vec<PointId> = ids
                .iter()
                .map(|id| stable_point_uuid(id).into())
                .collect();

            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(PointsIdsList { ids: point_ids }),
                )
                .await
                .map_err(|e| RetrievalError::Index(e.to_string()))?;
            Ok(())
        })
    }

    fn count<'a>(&'a self) -> IndexFuture<'a, usize> {
        Box::pin(async move {
            let res = self
                .client
                .count(CountPointsBuilder::new(&self.collection).exact(true))
                .await
                .map_err(|e| RetrievalError::Index(e.to_string()))?;
            Ok(res.result.map(|r| r.count as usize).unwrap_or(0))
        })
    }
}

/* ---------- payload and filter helpers ---------- */

/// Deterministic UUIDv5 from an arbitrary chunk id, so upserts with the
/// same id land on the same point.
fn stable_point_uuid(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes()).to_string()
}

/// Converts [`MetadataFilter`] to a Qdrant [`Filter`].
///
/// Only exact equality is supported, for:
/// - `String` → `Keyword`
/// - `Number` → `Integer`
/// - `Bool`   → `Boolean`
fn to_qdrant_filter(f: &MetadataFilter) -> Filter {
    let must: Vec<Condition> = f
        .equals
        .iter()
        .filter_map(|(field, val)| equality_condition(field, val))
        .collect();
    Filter {
        must,
        ..Default::default()
    }
}

fn equality_condition(field: &str, val: &Value) -> Option<Condition> {
    let m = match val {
        Value::String(s) => Match {
            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                s.clone(),
            )),
        },
        Value::Number(n) => Match {
            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Integer(
                n.as_i64()?,
            )),
        },
        Value::Bool(b) => Match {
            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Boolean(*b)),
        },
        _ => return None, // skip unsupported types
    };

    Some(Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: field.to_string(),
            r#match: Some(m),
            ..Default::default()
        })),
    })
}

/// Converts a Qdrant payload into a metadata map, recovering `content`
/// and `chunk_id` alongside the user metadata.
fn qpayload_to_metadata(
    mut p: std::collections::HashMap<String, QValue>,
) -> BTreeMap<String, Value> {
    let mut m = BTreeMap::new();
    for (k, v) in p.drain() {
        m.insert(k, qvalue_to_json(v));
    }
    m
}

fn stored_from_payload(mut payload: BTreeMap<String, Value>) -> StoredPoint {
    let id = payload
        .remove("chunk_id")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let document = payload
        .remove("content")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    StoredPoint {
        id,
        document,
        metadata: payload,
    }
}

/// Converts a Qdrant `Value` into JSON (handles nested arrays/objects).
fn qvalue_to_json(v: QValue) -> Value {
    use value::Kind as K;
    match v.kind {
        Some(K::StringValue(s)) => Value::String(s),
        Some(K::IntegerValue(i)) => Value::Number(i.into()),
        Some(K::DoubleValue(f)) => serde_json::json!(f),
        Some(K::BoolValue(b)) => Value::Bool(b),
        Some(K::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(qvalue_to_json).collect())
        }
        Some(K::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qvalue_to_json(v)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Wraps a string into a Qdrant `Value`.
fn qstring(s: &str) -> QValue {
    QValue {
        kind: Some(value::Kind::StringValue(s.to_string())),
    }
}

/// Converts `serde_json::Value` into a Qdrant `Value` (handles arrays/objects).
fn json_to_qvalue(v: Value) -> QValue {
    use value::Kind as K;
    match v {
        Value::String(s) => QValue {
            kind: Some(K::StringValue(s)),
        },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                QValue {
                    kind: Some(K::IntegerValue(i)),
                }
            } else if let Some(f) = n.as_f64() {
                QValue {
                    kind: Some(K::DoubleValue(f)),
                }
            } else {
                QValue {
                    kind: Some(K::StringValue(n.to_string())),
                }
            }
        }
        Value::Bool(b) => QValue {
            kind: Some(K::BoolValue(b)),
        },
        Value::Array(arr) => {
            let vals: Vec<QValue> = arr.into_iter().map(json_to_qvalue).collect();
            QValue {
                kind: Some(K::ListValue(ListValue { values: vals })),
            }
        }
        Value::Object(map) => {
            let fields = map
                .into_iter()
                .map(|(k, v)| (k, json_to_qvalue(v)))
                .collect();
            QValue {
                kind: Some(K::StructValue(Struct { fields })),
            }
        }
        Value::Null => QValue { kind: None },
    }
}
