//! Weaviate adapter: graph/object engine requiring UUID identifiers
//! (spec §4.5)
//!
//! Like Pinecone, no dedicated async Rust client for Weaviate exists in
//! this stack; the adapter speaks Weaviate's REST (objects) and GraphQL
//! (`nearVector` search) surfaces over `reqwest`. Integer IDs are coerced
//! to UUID v5 via [`crate::id`] and the reverse mapping is recovered by
//! round-tripping the integer through a stored `externalId` property,
//! since UUID v5 derivation is one-way.

use crate::error::{ConnectionFailureKind, Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{FilterPredicate, SearchFilter};
use crate::id;
use crate::types::{ListResult, Payload, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};

const EXTERNAL_ID_FIELD: &str = "externalId";

fn translate_filter(filter: &SearchFilter) -> Value {
    let operands: Vec<Value> = filter
        .iter()
        .map(|(key, predicate)| match predicate {
            FilterPredicate::Eq(value) => json!({
                "path": [key],
                "operator": "Equal",
                "valueText": value,
            }),
            FilterPredicate::Range(bounds) => {
                // Weaviate's `where` filter is a single binary operator per
                // operand; compose an `And` of the bounds present.
                let mut sub = Vec::new();
                if let Some(v) = bounds.gte {
                    sub.push(json!({ "path": [key], "operator": "GreaterThanEqual", "valueNumber": v }));
                }
                if let Some(v) = bounds.gt {
                    sub.push(json!({ "path": [key], "operator": "GreaterThan", "valueNumber": v }));
                }
                if let Some(v) = bounds.lte {
                    sub.push(json!({ "path": [key], "operator": "LessThanEqual", "valueNumber": v }));
                }
                if let Some(v) = bounds.lt {
                    sub.push(json!({ "path": [key], "operator": "LessThan", "valueNumber": v }));
                }
                json!({ "operator": "And", "operands": sub })
            }
            FilterPredicate::AnyOf(values) => json!({
                "operator": "Or",
                "operands": values.iter().map(|v| json!({
                    "path": [key], "operator": "Equal", "valueText": v,
                })).collect::<Vec<_>>(),
            }),
            // No native "all" operator; reduced deterministically to the
            // first element (spec §4.5).
            FilterPredicate::AllOf(values) => json!({
                "path": [key],
                "operator": "Equal",
                "valueText": values.first().cloned().unwrap_or(Value::Null),
            }),
        })
        .collect();

    if operands.len() == 1 {
        operands.into_iter().next().unwrap()
    } else {
        json!({ "operator": "And", "operands": operands })
    }
}

/// Adapter over a Weaviate class ("class" is Weaviate's term for a
/// collection).
pub struct WeaviateBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    class_name: String,
    dimension: usize,
    connected: AtomicBool,
}

impl WeaviateBackend {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        class_name: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            class_name: class_name.into(),
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
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn ensure_class(&self) -> VectorStoreResult<()> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/schema/{}", self.class_name))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::connection_failed_with_source(
                    "weaviate",
                    ConnectionFailureKind::Unreachable,
                    "failed to reach weaviate schema endpoint",
                    e,
                )
            })?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::connection_failed(
                "weaviate",
                ConnectionFailureKind::Unreachable,
                format!("schema check returned {}", response.status()),
            ));
        }

        let body = json!({
            "class": self.class_name,
            "vectorizer": "none",
        });
        let create = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::connection_failed_with_source(
                    "weaviate",
                    ConnectionFailureKind::SchemaMismatch,
                    "failed to create class",
                    e,
                )
            })?;
        if !create.status().is_success() {
            return Err(VectorStoreError::connection_failed(
                "weaviate",
                ConnectionFailureKind::SchemaMismatch,
                format!("class creation returned {}", create.status()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl crate::store::VectorStore for WeaviateBackend {
    #[tracing::instrument(skip(self), fields(class = %self.class_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        self.ensure_class().await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("weaviate backend connected");
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

        for ((vector, vid), mut payload) in vectors.into_iter().zip(ids).zip(payloads) {
            payload.insert(EXTERNAL_ID_FIELD.to_string(), json!(vid));
            let uuid = id::to_uuid(vid);
            let body = json!({
                "id": uuid,
                "class": self.class_name,
                "properties": payload,
                "vector": vector,
            });
            let response = self
                .request(reqwest::Method::PUT, &format!("/v1/objects/{uuid}"))
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    VectorStoreError::backend_failure_with_source(Operation::Insert, "put object failed", e)
                })?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                let create = self
                    .request(reqwest::Method::POST, "/v1/objects")
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        VectorStoreError::backend_failure_with_source(
                            Operation::Insert,
                            "create object failed",
                            e,
                        )
                    })?;
                if !create.status().is_success() {
                    return Err(VectorStoreError::backend_failure(
                        Operation::Insert,
                        format!("create object returned {}", create.status()),
                    ));
                }
            } else if !response.status().is_success() {
                return Err(VectorStoreError::backend_failure(
                    Operation::Insert,
                    format!("put object returned {}", response.status()),
                ));
            }
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

        let vector_literal = format!(
            "[{}]",
            query.iter().map(f32::to_string).collect::<Vec<_>>().join(",")
        );
        let where_clause = filter
            .as_ref()
            .map(|f| format!(", where: {}", weaviate_where_literal(&translate_filter(f))))
            .unwrap_or_default();

        let graphql = format!(
            "{{ Get {{ {class}(nearVector: {{ vector: {vector_literal} }}, limit: {limit}{where_clause}) \
             {{ {external_id} _additional {{ certainty }} }} }} }}",
            class = self.class_name,
            external_id = EXTERNAL_ID_FIELD,
        );

        let response: Value = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Search, "graphql request failed", e)
            })?
            .json()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Search, "invalid graphql response", e)
            })?;

        let items = response
            .pointer(&format!("/data/Get/{}", self.class_name))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let id = item.get(EXTERNAL_ID_FIELD)?.as_u64()?;
                let score = item
                    .pointer("/_additional/certainty")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                let payload = item.as_object().cloned().unwrap_or_default();
                Some(SearchResult {
                    id,
                    score,
                    payload,
                    vector: None,
                })
            })
            .collect())
    }

    async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        self.require_connected(Operation::Get)?;
        let uuid = crate::id::to_uuid(id);
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/objects/{uuid}"))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Get, "get object failed", e)
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response.json().await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(Operation::Get, "invalid object response", e)
        })?;
        let payload: Payload = body
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Some(SearchResult::exact(id, payload, None)))
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
        let uuid = crate::id::to_uuid(id);
        let response = self
            .request(reqwest::Method::DELETE, &format!("/v1/objects/{uuid}"))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Delete, "delete failed", e)
            })?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::backend_failure(
                Operation::Delete,
                format!("delete returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        let response = self
            .request(reqwest::Method::DELETE, &format!("/v1/schema/{}", self.class_name))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(
                    Operation::DeleteCollection,
                    "delete class failed",
                    e,
                )
            })?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::backend_failure(
                Operation::DeleteCollection,
                format!("delete class returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        self.require_connected(Operation::List)?;
        let where_clause = filter
            .as_ref()
            .map(|f| format!("(where: {})", weaviate_where_literal(&translate_filter(f))))
            .unwrap_or_default();
        let limit_value = limit.unwrap_or(100);

        let graphql = format!(
            "{{ Get {{ {class}{where_clause} {{ {external_id} }} }} }}",
            class = self.class_name,
            external_id = EXTERNAL_ID_FIELD,
        );
        let response: Value = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::List, "graphql request failed", e)
            })?
            .json()
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::List, "invalid graphql response", e)
            })?;

        let items = response
            .pointer(&format!("/data/Get/{}", self.class_name))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results: Vec<SearchResult> = items
            .into_iter()
            .filter_map(|item| {
                let id = item.get(EXTERNAL_ID_FIELD)?.as_u64()?;
                Some(SearchResult::exact(id, item.as_object().cloned().unwrap_or_default(), None))
            })
            .collect();
        let total_count = results.len();
        results.truncate(limit_value);

        Ok(ListResult {
            results,
            total_count,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn backend_type(&self) -> &str {
        "weaviate"
    }

    fn collection_name(&self) -> &str {
        &self.class_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn weaviate_where_literal(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_derivation_is_used_for_object_ids() {
        assert_eq!(id::to_uuid(5), id::to_uuid(5));
        assert_ne!(id::to_uuid(5), id::to_uuid(6));
    }
}
