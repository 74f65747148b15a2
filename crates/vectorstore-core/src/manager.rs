//! Manager Wrapper (C9): a thin lifecycle/metadata holder around a single
//! store (spec §4.9)

use crate::error::VectorStoreResult;
use crate::filter::SearchFilter;
use crate::store::VectorStore;
use crate::types::{ListResult, SearchResult, Vector, VectorId};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use vectorstore_common::CorrelationId;

/// Structural snapshot of a store's identity and connection provenance.
/// Callers use it for logging and conditional behavior; it is a plain
/// value, not a handle, so there is nothing to accidentally mutate.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub backend_type: String,
    pub collection_name: String,
    pub dimension: usize,
    /// Set when the factory substituted the in-process baseline after a
    /// remote connect failure (spec §4.7 "Connect-with-fallback").
    pub fallback: bool,
}

/// Facade around `Arc<dyn VectorStore>` (spec §4.9).
pub struct ManagedStore {
    backend: Arc<dyn VectorStore>,
    fallback: AtomicBool,
}

impl ManagedStore {
    #[must_use]
    pub fn new(backend: Arc<dyn VectorStore>) -> Self {
        Self {
            backend,
            fallback: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_fallback_flag(backend: Arc<dyn VectorStore>, fallback: bool) -> Self {
        Self {
            backend,
            fallback: AtomicBool::new(fallback),
        }
    }

    pub async fn connect(&self) -> VectorStoreResult<()> {
        self.backend.connect().await
    }

    pub async fn disconnect(&self) -> VectorStoreResult<()> {
        self.backend.disconnect().await
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    #[must_use]
    pub fn info(&self) -> StoreInfo {
        StoreInfo {
            backend_type: self.backend.backend_type().to_string(),
            collection_name: self.backend.collection_name().to_string(),
            dimension: self.backend.dimension(),
            fallback: self.fallback.load(Ordering::SeqCst),
        }
    }

    /// Direct handle to the underlying store for callers that need the
    /// full [`VectorStore`] surface beyond lifecycle/metadata.
    #[must_use]
    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.backend)
    }

    pub async fn insert(
        &self,
        vectors: Vec<Vector>,
        ids: Vec<VectorId>,
        payloads: Vec<Map<String, Value>>,
    ) -> VectorStoreResult<()> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            count = ids.len(),
            "insert"
        );
        self.backend.insert(vectors, ids, payloads).await
    }

    pub async fn search(
        &self,
        query: Vector,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> VectorStoreResult<Vec<SearchResult>> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            limit,
            "search"
        );
        self.backend.search(query, limit, filter).await
    }

    pub async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            id,
            "get"
        );
        self.backend.get(id).await
    }

    pub async fn update(
        &self,
        id: VectorId,
        vector: Vector,
        payload: Map<String, Value>,
    ) -> VectorStoreResult<()> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            id,
            "update"
        );
        self.backend.update(id, vector, payload).await
    }

    pub async fn delete(&self, id: VectorId) -> VectorStoreResult<()> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            id,
            "delete"
        );
        self.backend.delete(id).await
    }

    pub async fn delete_collection(&self) -> VectorStoreResult<()> {
        let correlation_id = CorrelationId::new();
        tracing::info!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            "delete_collection"
        );
        self.backend.delete_collection().await
    }

    pub async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        let correlation_id = CorrelationId::new();
        tracing::debug!(
            correlation_id = %correlation_id,
            collection = self.backend.collection_name(),
            "list"
        );
        self.backend.list(filter, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryStore;

    #[tokio::test]
    async fn info_reflects_identity_and_fallback_flag() {
        let backend = Arc::new(MemoryStore::new("coll", 3, 10));
        let managed = ManagedStore::with_fallback_flag(backend, true);
        managed.connect().await.unwrap();
        let info = managed.info();
        assert_eq!(info.backend_type, "memory");
        assert_eq!(info.collection_name, "coll");
        assert!(info.fallback);
        assert!(managed.is_connected());
    }
}
