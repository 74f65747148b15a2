//! Pinecone adapter: managed index service with namespace partitioning
//! (spec §4.5)
//!
//! No official async Rust SDK for Pinecone exists in this stack, so the
//! adapter speaks the documented REST API directly over `reqwest`, the
//! same crate the workspace already depends on for outbound HTTP. IDs are
//! stringified (Pinecone's vector IDs are opaque strings); metadata
//! filters use Pinecone's boolean-operator dialect (`$eq`, `$gte`, ...).

use crate::error::{ConnectionFailureKind, Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{FilterPredicate, SearchFilter};
use crate::id;
use crate::types::{ListResult, Payload, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};

fn translate_filter(filter: &SearchFilter) -> Value {
    let mut conditions = Map::new();
    for (key, predicate) in filter {
        let clause = match predicate {
            FilterPredicate::Eq(value) => json!({ "$eq": value }),
            FilterPredicate::Range(bounds) => {
                let mut range = Map::new();
                if let Some(v) = bounds.gte {
                    range.insert("$gte".to_string(), json!(v));
                }
                if let Some(v) = bounds.gt {
                    range.insert("$gt".to_string(), json!(v));
                }
                if let Some(v) = bounds.lte {
                    range.insert("$lte".to_string(), json!(v));
                }
                if let Some(v) = bounds.lt {
                    range.insert("$lt".to_string(), json!(v));
                }
                Value::Object(range)
            }
            FilterPredicate::AnyOf(values) => json!({ "$in": values }),
            // Pinecone's metadata filter has no multi-valued "all" match;
            // reduce deterministically to the first element (spec §4.5).
            FilterPredicate::AllOf(values) => {
                json!({ "$eq": values.first().cloned().unwrap_or(Value::Null) })
            }
        };
        conditions.insert(key.clone(), clause);
    }
    Value::Object(conditions)
}

/// Adapter over a Pinecone index, scoped to one namespace.
pub struct PineconeBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    collection_name: String,
    namespace: String,
    dimension: usize,
    connected: AtomicBool,
}

impl PineconeBackend {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        collection_name: impl Into<String>,
        namespace: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            collection_name: collection_name.into(),
            namespace: namespace.into(),
            dimension,
            connected: AtomicBool::new(false),
        }
    }

    fn require_connected(&self, operation: Operation) -> VectorStoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(VectorStoreError::not_connected(operation))
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    fn classify_status(status: reqwest::StatusCode) -> ConnectionFailureKind {
        match status.as_u16() {
            401 | 403 => ConnectionFailureKind::AuthenticationRejected,
            404 => ConnectionFailureKind::SchemaMismatch,
            429 => ConnectionFailureKind::RateLimited,
            _ => ConnectionFailureKind::Unreachable,
        }
    }
}

#[async_trait]
impl crate::store::VectorStore for PineconeBackend {
    #[tracing::instrument(skip(self), fields(collection = %self.collection_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        let response = self
            .request(reqwest::Method::GET, "/describe_index_stats")
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::connection_failed_with_source(
                    "pinecone",
                    ConnectionFailureKind::Unreachable,
                    "failed to reach pinecone index",
                    e,
                )
            })?;

        if !response.status().is_success() {
            return Err(VectorStoreError::connection_failed(
                "pinecone",
                Self::classify_status(response.status()),
                format!("describe_index_stats returned {}", response.status()),
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("pinecone backend connected");
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

        let upserts: Vec<Value> = vectors
            .into_iter()
            .zip(ids)
            .zip(payloads)
            .map(|((vector, vid), payload)| {
                json!({
                    "id": id::stringify(vid),
                    "values": vector,
                    "metadata": payload,
                })
            })
            .collect();

        let body = json!({ "vectors": upserts, "namespace": self.namespace });
        let response = self
            .request(reqwest::Method::POST, "/vectors/upsert")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Insert, "upsert request failed", e)
            })?;

        if !response.status().is_success() {
            return Err(VectorStoreError::backend_failure(
                Operation::Insert,
                format!("upsert returned {}", response.status()),
            ));
        }
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

        let mut body = json!({
            "vector": query,
            "topK": limit,
            "namespace": self.namespace,
            "includeMetadata": true,
        });
        if let Some(filter) = &filter {
            body["filter"] = translate_filter(filter);
        }

        let response = self
            .request(reqwest::Method::POST, "/query")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Search, "query request failed", e)
            })?
            .json::<Value>()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Search, "invalid query response", e)
            })?;

        let matches = response
            .get("matches")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(matches
            .into_iter()
            .filter_map(|m| {
                let sid = m.get("id")?.as_str().and_then(id::parse_stringified)?;
                let score = m.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
                let payload = m
                    .get("metadata")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some(SearchResult {
                    id: sid,
                    score,
                    payload,
                    vector: None,
                })
            })
            .collect())
    }

    async fn get(&self, vid: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        self.require_connected(Operation::Get)?;
        let response = self
            .request(reqwest::Method::GET, "/vectors/fetch")
            .query(&[("ids", id::stringify(vid)), ("namespace", self.namespace.clone())])
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Get, "fetch request failed", e)
            })?
            .json::<Value>()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Get, "invalid fetch response", e)
            })?;

        let key = id::stringify(vid);
        let Some(vector_entry) = response.get("vectors").and_then(|v| v.get(&key)) else {
            return Ok(None);
        };

        let payload: Payload = vector_entry
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Some(SearchResult::exact(vid, payload, None)))
    }

    async fn update(
        &self,
        id: VectorId,
        vector: Vector,
        payload: Map<String, Value>,
    ) -> VectorStoreResult<()> {
        self.insert(vec![vector], vec![id], vec![payload]).await
    }

    async fn delete(&self, vid: VectorId) -> VectorStoreResult<()> {
        self.require_connected(Operation::Delete)?;
        let body = json!({ "ids": [id::stringify(vid)], "namespace": self.namespace });
        // Pinecone's delete-by-id is idempotent for a missing id (no 404),
        // so any error here is a genuine request/server failure.
        let response = self
            .request(reqwest::Method::POST, "/vectors/delete")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Delete, "delete failed", e)
            })?;
        if !response.status().is_success() {
            return Err(VectorStoreError::backend_failure(
                Operation::Delete,
                format!("delete returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        let body = json!({ "deleteAll": true, "namespace": self.namespace });
        let response = self
            .request(reqwest::Method::POST, "/vectors/delete")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(
                    Operation::DeleteCollection,
                    "delete-all request failed",
                    e,
                )
            })?;
        if !response.status().is_success() {
            return Err(VectorStoreError::backend_failure(
                Operation::DeleteCollection,
                format!("delete-all returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn list(
        &self,
        _filter: Option<SearchFilter>,
        _limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        // Pinecone exposes no scan/cursor primitive for vector data; fail
        // fast rather than emulate via repeated search (spec §4.5 "List
        // support").
        Err(VectorStoreError::invalid_argument(
            Operation::List,
            "pinecone backend does not support list",
        ))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn backend_type(&self) -> &str {
        "pinecone"
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translate_filter_maps_eq_and_range() {
        let filter = SearchFilter::from([
            ("tag".to_string(), FilterPredicate::Eq(json!("x"))),
            (
                "rank".to_string(),
                FilterPredicate::Range(crate::filter::RangeBounds {
                    gte: Some(3.0),
                    ..Default::default()
                }),
            ),
        ]);
        let translated = translate_filter(&filter);
        assert_eq!(translated["tag"]["$eq"], json!("x"));
        assert_eq!(translated["rank"]["$gte"], json!(3.0));
    }
}
