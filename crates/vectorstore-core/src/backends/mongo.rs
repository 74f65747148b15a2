//! MongoDB Atlas Vector Search adapter: JSON-document engine (spec §4.5)
//!
//! Grounded on the real `mongodb` async driver. IDs are stringified into
//! `_id`; filters compose a `$match` stage ahead of the `$vectorSearch`
//! aggregation stage; the collection's Atlas Search index is assumed
//! pre-provisioned (Atlas vector indexes are managed outside the driver's
//! CRUD surface, so bootstrap here is limited to verifying the collection
//! exists and creating it if absent).

use crate::error::{ConnectionFailureKind, Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{FilterPredicate, SearchFilter};
use crate::id;
use crate::types::{ListResult, Payload, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

const VECTOR_FIELD: &str = "embedding";
const VECTOR_INDEX_NAME: &str = "vector_index";

fn translate_filter(filter: &SearchFilter) -> Document {
    let mut match_doc = Document::new();
    for (key, predicate) in filter {
        let field = format!("payload.{key}");
        match predicate {
            FilterPredicate::Eq(value) => {
                match_doc.insert(field, json_to_bson(value));
            }
            FilterPredicate::Range(bounds) => {
                let mut range = Document::new();
                if let Some(v) = bounds.gte {
                    range.insert("$gte", v);
                }
                if let Some(v) = bounds.gt {
                    range.insert("$gt", v);
                }
                if let Some(v) = bounds.lte {
                    range.insert("$lte", v);
                }
                if let Some(v) = bounds.lt {
                    range.insert("$lt", v);
                }
                match_doc.insert(field, range);
            }
            FilterPredicate::AnyOf(values) => {
                let bson_values: Vec<_> = values.iter().map(json_to_bson).collect();
                match_doc.insert(field, doc! { "$in": bson_values });
            }
            FilterPredicate::AllOf(values) => {
                let bson_values: Vec<_> = values.iter().map(json_to_bson).collect();
                match_doc.insert(field, doc! { "$all": bson_values });
            }
        }
    }
    match_doc
}

fn json_to_bson(value: &Value) -> mongodb::bson::Bson {
    mongodb::bson::to_bson(value).unwrap_or(mongodb::bson::Bson::Null)
}

/// Adapter over a MongoDB Atlas collection with vector search enabled.
pub struct MongoBackend {
    client: Client,
    database: String,
    collection_name: String,
    dimension: usize,
    connected: AtomicBool,
    state: RwLock<()>,
}

impl MongoBackend {
    pub async fn new(
        uri: &str,
        database: impl Into<String>,
        collection_name: impl Into<String>,
        dimension: usize,
    ) -> VectorStoreResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(|e| {
            VectorStoreError::connection_failed_with_source(
                "mongo",
                ConnectionFailureKind::Unreachable,
                "failed to build mongo client",
                e,
            )
        })?;

        Ok(Self {
            client,
            database: database.into(),
            collection_name: collection_name.into(),
            dimension,
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

    fn collection(&self) -> Collection<Document> {
        self.client
            .database(&self.database)
            .collection(&self.collection_name)
    }

    async fn ensure_collection(&self) -> VectorStoreResult<()> {
        let names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| {
                VectorStoreError::connection_failed_with_source(
                    "mongo",
                    ConnectionFailureKind::Unreachable,
                    "failed to list collections",
                    e,
                )
            })?;

        if !names.contains(&self.collection_name) {
            self.client
                .database(&self.database)
                .create_collection(&self.collection_name)
                .await
                .map_err(|e| {
                    VectorStoreError::connection_failed_with_source(
                        "mongo",
                        ConnectionFailureKind::SchemaMismatch,
                        "failed to create collection",
                        e,
                    )
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl crate::store::VectorStore for MongoBackend {
    #[tracing::instrument(skip(self), fields(collection = %self.collection_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        let _guard = self.state.write().await;
        self.ensure_collection().await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(
            index = VECTOR_INDEX_NAME,
            "mongo backend connected (assumes Atlas vector index is provisioned)"
        );
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

        let collection = self.collection();
        for ((vector, vid), payload) in vectors.into_iter().zip(ids).zip(payloads) {
            let document = doc! {
                "_id": id::stringify(vid),
                VECTOR_FIELD: vector,
                "payload": mongodb::bson::to_bson(&Value::Object(payload)).map_err(|e| {
                    VectorStoreError::backend_failure_with_source(
                        Operation::Insert,
                        "failed to encode payload",
                        e,
                    )
                })?,
            };
            collection
                .replace_one(doc! { "_id": id::stringify(vid) }, document)
                .upsert(true)
                .await
                .map_err(|e| {
                    VectorStoreError::backend_failure_with_source(Operation::Insert, "upsert failed", e)
                })?;
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

        let mut vector_search = doc! {
            "index": VECTOR_INDEX_NAME,
            "path": VECTOR_FIELD,
            "queryVector": query,
            "numCandidates": (limit as i64) * 10,
            "limit": limit as i64,
        };
        if let Some(filter) = &filter {
            vector_search.insert("filter", translate_filter(filter));
        }

        let pipeline = vec![
            doc! { "$vectorSearch": vector_search },
            doc! { "$project": { "_id": 1, "payload": 1, "score": { "$meta": "vectorSearchScore" } } },
        ];

        use futures::stream::TryStreamExt;
        let mut cursor = self.collection().aggregate(pipeline).await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(Operation::Search, "vectorSearch failed", e)
        })?;

        let mut results = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(Operation::Search, "cursor error", e)
        })? {
            if let Some(result) = document_to_result(&document) {
                results.push(result);
            }
        }
        Ok(results)
    }

    async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        self.require_connected(Operation::Get)?;
        let document = self
            .collection()
            .find_one(doc! { "_id": id::stringify(id) })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Get, "find_one failed", e)
            })?;

        Ok(document.and_then(|document| {
            let payload = document
                .get("payload")
                .and_then(|v| mongodb::bson::from_bson::<Value>(v.clone()).ok())
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            Some(SearchResult::exact(id, payload, None))
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
        // `delete_one` on a missing `_id` reports zero deleted, not an
        // error, so idempotency falls out naturally; any `Err` here is a
        // genuine driver/server failure and must propagate.
        self.collection()
            .delete_one(doc! { "_id": id::stringify(id) })
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::Delete, "delete failed", e)
            })?;
        Ok(())
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        self.collection().drop().await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(
                Operation::DeleteCollection,
                "drop failed",
                e,
            )
        })
    }

    async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        self.require_connected(Operation::List)?;
        let match_doc = filter.as_ref().map(translate_filter).unwrap_or_default();

        use futures::stream::TryStreamExt;
        let total_count = self
            .collection()
            .count_documents(match_doc.clone())
            .await
            .map_err(|e| {
                VectorStoreError::backend_failure_with_source(Operation::List, "count failed", e)
            })? as usize;

        let mut cursor = self.collection().find(match_doc);
        if let Some(limit) = limit {
            cursor = cursor.limit(limit as i64);
        }
        let mut cursor = cursor.await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(Operation::List, "find failed", e)
        })?;

        let mut results = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|e| {
            VectorStoreError::backend_failure_with_source(Operation::List, "cursor error", e)
        })? {
            if let Some(result) = document_to_result(&document) {
                results.push(result);
            }
        }
        Ok(ListResult {
            results,
            total_count,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn backend_type(&self) -> &str {
        "mongo"
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn document_to_result(document: &Document) -> Option<SearchResult> {
    let id = document
        .get("_id")
        .and_then(|v| v.as_str())
        .and_then(id::parse_stringified)?;
    let score = document
        .get("score")
        .and_then(|v| v.as_f64())
        .unwrap_or(1.0) as f32;
    let payload: Payload = document
        .get("payload")
        .and_then(|v| mongodb::bson::from_bson::<Value>(v.clone()).ok())
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    Some(SearchResult {
        id,
        score,
        payload,
        vector: None,
    })
}
