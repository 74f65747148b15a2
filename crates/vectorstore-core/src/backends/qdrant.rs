//! Qdrant adapter: dense-vector engine with native integer point IDs
//! (spec §4.5)
//!
//! Grounded directly on
//! `codetriever_vector_data::storage::qdrant::QdrantStorage`: same
//! `Qdrant::from_url` construction, `CreateCollection`/`VectorParams`
//! bootstrap tolerant of a concurrent "already exists" race, and
//! `SearchPoints`/`UpsertPoints`/`DeletePoints` operation shapes.

use crate::error::{ConnectionFailureKind, Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{FilterPredicate, SearchFilter};
use crate::types::{DistanceMetric, ListResult, Payload, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollection, Distance, Filter as QdrantFilter, PointStruct, Range,
    ScrollPoints, SearchPoints, UpsertPoints, VectorParams, VectorsConfig,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

fn to_qdrant_distance(distance: DistanceMetric) -> Distance {
    match distance {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Euclidean => Distance::Euclid,
        DistanceMetric::Dot => Distance::Dot,
    }
}

fn translate_filter(filter: &SearchFilter) -> VectorStoreResult<QdrantFilter> {
    let mut must = Vec::new();
    for (key, predicate) in filter {
        match predicate {
            FilterPredicate::Eq(value) => {
                must.push(Condition::matches(key, value_to_match(value)?));
            }
            FilterPredicate::Range(bounds) => {
                must.push(Condition::range(
                    key,
                    Range {
                        gte: bounds.gte,
                        gt: bounds.gt,
                        lte: bounds.lte,
                        lt: bounds.lt,
                    },
                ));
            }
            FilterPredicate::AnyOf(values) => {
                let strings: Vec<String> = values
                    .iter()
                    .map(value_to_match)
                    .collect::<VectorStoreResult<_>>()?;
                must.push(Condition::matches(key, strings));
            }
            FilterPredicate::AllOf(values) => {
                // Qdrant's `must` is itself a conjunction, so "all-of" on a
                // single-valued field reduces to matching its first element
                // (spec §4.5: "reduced deterministically, documented").
                if let Some(first) = values.first() {
                    must.push(Condition::matches(key, value_to_match(first)?));
                }
            }
        }
    }
    Ok(QdrantFilter {
        must,
        ..Default::default()
    })
}

fn value_to_match(value: &Value) -> VectorStoreResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_i64().map(|n| n.to_string()))
        .ok_or_else(|| {
            VectorStoreError::invalid_argument(
                Operation::Search,
                "qdrant match filters support string/integer values only",
            )
        })
}

/// Adapter over a Qdrant collection.
pub struct QdrantBackend {
    client: Qdrant,
    collection_name: String,
    dimension: usize,
    distance: DistanceMetric,
    connected: AtomicBool,
    /// Re-entered on `disconnect`/`connect` to model the state machine
    /// without tearing down the underlying HTTP client.
    state: RwLock<()>,
}

impl QdrantBackend {
    /// Build from an explicit URL, mirroring
    /// `QdrantStorage::new(url, collection_name)`.
    pub fn new(
        url: &str,
        api_key: Option<&str>,
        collection_name: impl Into<String>,
        dimension: usize,
        distance: DistanceMetric,
    ) -> VectorStoreResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(|e| {
            VectorStoreError::connection_failed_with_source(
                "qdrant",
                ConnectionFailureKind::Unreachable,
                "failed to build qdrant client",
                e,
            )
        })?;

        Ok(Self {
            client,
            collection_name: collection_name.into(),
            dimension,
            distance,
            connected: AtomicBool::new(false),
            state: RwLock::new(()),
        })
    }

    fn require_connected(&self, operation: Operation) -> VectorStoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(VectorStoreError::not_connected(operation))
        }
    }

    async fn ensure_collection(&self) -> VectorStoreResult<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| {
                VectorStoreError::connection_failed_with_source(
                    "qdrant",
                    ConnectionFailureKind::Unreachable,
                    "failed to check collection existence",
                    e,
                )
            })?;

        if exists {
            return Ok(());
        }

        let create = CreateCollection {
            collection_name: self.collection_name.clone(),
            vectors_config: Some(VectorsConfig::from(VectorParams {
                size: self.dimension as u64,
                distance: to_qdrant_distance(self.distance).into(),
                ..Default::default()
            })),
            ..Default::default()
        };

        match self.client.create_collection(create).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("already exists") => Ok(()),
            Err(e) => Err(VectorStoreError::connection_failed_with_source(
                "qdrant",
                ConnectionFailureKind::SchemaMismatch,
                "failed to create collection",
                e,
            )),
        }
    }
}

#[async_trait]
impl crate::store::VectorStore for QdrantBackend {
    #[tracing::instrument(skip(self), fields(collection = %self.collection_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        let _guard = self.state.write().await;
        self.ensure_collection().await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("qdrant backend connected");
        Ok(())
    }

    async fn disconnect(&self) -> VectorStoreResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(
        &self,
        vectors: Vec<Vector>,
        ids: Vec<VectorId>,
        payloads: Vec<Map<String, Value>>,
    ) -> VectorStoreResult<()> {
        self.require_connected(Operation::Insert)?;
        if vectors.len() != ids.len() || ids.len() != payloads.len() {
            return Err(VectorStoreError::invalid_argument(
                Operation::Insert,
                "vectors, ids, and payloads must have equal length",
            ));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(VectorStoreError::dimension_mismatch(
                    self.dimension,
                    vector.len(),
                ));
            }
        }

        let points: Vec<PointStruct> = vectors
            .into_iter()
            .zip(ids)
            .zip(payloads)
            .map(|((vector, id), payload)| {
                PointStruct::new(id, vector, qdrant_client::Payload::from(payload))
            })
            .collect();

        self.client
            .upsert_points(UpsertPoints {
                collection_name: self.collection_name.clone(),
                points,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Insert, "upsert failed", e)
            })?;
        Ok(())
    }

    async fn search(
        &self,
        query: Vector,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> VectorStoreResult<Vec<SearchResult>> {
        self.require_connected(Operation::Search)?;
        if query.len() != self.dimension {
            return Err(VectorStoreError::dimension_mismatch(
                self.dimension,
                query.len(),
            ));
        }

        let qdrant_filter = filter.as_ref().map(translate_filter).transpose()?;

        let response = self
            .client
            .search_points(SearchPoints {
                collection_name: self.collection_name.clone(),
                vector: query,
                limit: limit as u64,
                filter: qdrant_filter,
                with_payload: Some(true.into()),
                with_vectors: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Search, "search failed", e)
            })?;

        Ok(response
            .result
            .into_iter()
            .map(|scored_point| SearchResult {
                id: scored_point
                    .id
                    .and_then(|id| id.point_id_options)
                    .and_then(|opts| match opts {
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => Some(n),
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(_) => None,
                    })
                    .unwrap_or_default(),
                score: scored_point.score,
                payload: scored_point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| qdrant_value_to_json(v).map(|json| (k, json)))
                    .collect(),
                vector: None,
            })
            .collect())
    }

    async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        self.require_connected(Operation::Get)?;
        let response = self
            .client
            .get_points(qdrant_client::qdrant::GetPoints {
                collection_name: self.collection_name.clone(),
                ids: vec![id.into()],
                with_payload: Some(true.into()),
                with_vectors: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Get, "get failed", e)
            })?;

        Ok(response.result.into_iter().next().map(|point| {
            let payload = point
                .payload
                .into_iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|json| (k, json)))
                .collect();
            SearchResult::exact(id, payload, None)
        }))
    }

    async fn update(
        &self,
        id: VectorId,
        vector: Vector,
        payload: Map<String, Value>,
    ) -> VectorStoreResult<()> {
        self.insert(vec![vector], vec![id], vec![payload]).await
    }

    async fn delete(&self, id: VectorId) -> VectorStoreResult<()> {
        self.require_connected(Operation::Delete)?;
        // Qdrant's delete endpoint does not error on a missing point id, so
        // idempotency falls out naturally; any error here is a genuine
        // backend failure and must propagate rather than be swallowed.
        self.client
            .delete_points(qdrant_client::qdrant::DeletePoints {
                collection_name: self.collection_name.clone(),
                points: Some(qdrant_client::qdrant::PointsSelector::from(vec![id.into()])),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Delete, "delete failed", e)
            })?;
        Ok(())
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        self.client
            .delete_collection(self.collection_name.clone())
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(
                    Operation::DeleteCollection,
                    "delete_collection failed",
                    e,
                )
            })?;
        Ok(())
    }

    async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        self.require_connected(Operation::List)?;
        let qdrant_filter = filter.as_ref().map(translate_filter).transpose()?;

        let response = self
            .client
            .scroll(ScrollPoints {
                collection_name: self.collection_name.clone(),
                filter: qdrant_filter,
                limit: limit.map(|l| l as u32),
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::List, "scroll failed", e)
            })?;

        let results: Vec<SearchResult> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point
                    .id
                    .and_then(|id| id.point_id_options)
                    .and_then(|opts| match opts {
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => Some(n),
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(_) => None,
                    })?;
                let payload: Payload = point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| qdrant_value_to_json(v).map(|json| (k, json)))
                    .collect();
                Some(SearchResult::exact(id, payload, None))
            })
            .collect();

        Ok(ListResult {
            total_count: results.len(),
            results,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn backend_type(&self) -> &str {
        "qdrant"
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Manual extraction from Qdrant's protobuf `Value` to `serde_json::Value`,
/// mirroring the field-by-field approach `QdrantStorage::search` uses to
/// read payload fields back off a `ScoredPoint`.
fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> Option<Value> {
    use qdrant_client::qdrant::value::Kind;
    match value.kind? {
        Kind::StringValue(s) => Some(Value::String(s)),
        Kind::IntegerValue(n) => Some(Value::from(n)),
        Kind::DoubleValue(n) => serde_json::Number::from_f64(n).map(Value::Number),
        Kind::BoolValue(b) => Some(Value::Bool(b)),
        Kind::ListValue(list) => Some(Value::Array(
            list.values.into_iter().filter_map(qdrant_value_to_json).collect(),
        )),
        Kind::StructValue(s) => Some(Value::Object(
            s.fields
                .into_iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|json| (k, json)))
                .collect(),
        )),
        Kind::NullValue(_) => Some(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_all_of_to_first_element() {
        let filter = SearchFilter::from([(
            "tag".to_string(),
            FilterPredicate::AllOf(vec![Value::from("a"), Value::from("b")]),
        )]);
        let translated = translate_filter(&filter).unwrap();
        assert_eq!(translated.must.len(), 1);
    }
}
