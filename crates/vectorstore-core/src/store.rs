//! The polymorphic store contract every backend satisfies (spec §4.2)

use crate::error::VectorStoreResult;
use crate::filter::SearchFilter;
use crate::types::{ListResult, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

/// Capability set {connect, disconnect, insert, search, get, update,
/// delete, list, `delete_collection`, `backend_type`, dimension,
/// `collection_name`} (spec §9 "Interface polymorphism").
///
/// Implementors are held behind `Arc<dyn VectorStore>` by
/// [`crate::manager::ManagedStore`]; `Send + Sync` lets that handle cross
/// Tokio task boundaries freely, mirroring
/// `codetriever_vector_data::VectorStorage`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Perform the remote handshake and any schema/index bootstrap.
    /// Idempotent: calling `connect` while already connected is a no-op.
    async fn connect(&self) -> VectorStoreResult<()>;

    /// Release client resources. Never fails observably; tolerates being
    /// called while already disconnected.
    async fn disconnect(&self) -> VectorStoreResult<()>;

    /// Insert or upsert `vectors`/`ids`/`payloads`, which must have equal
    /// length. Either the whole batch is applied or the store is left
    /// unchanged (spec §3 invariant 2).
    async fn insert(
        &self,
        vectors: Vec<Vector>,
        ids: Vec<VectorId>,
        payloads: Vec<Map<String, Value>>,
    ) -> VectorStoreResult<()>;

    /// Return up to `limit` nearest neighbors of `query`, optionally
    /// restricted by `filter`, sorted by score descending with a
    /// deterministic tie-break on ID ascending.
    async fn search(
        &self,
        query: Vector,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> VectorStoreResult<Vec<SearchResult>>;

    /// Exact retrieval by ID; `None` if absent.
    async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>>;

    /// Replace the vector and payload stored under `id`.
    async fn update(
        &self,
        id: VectorId,
        vector: Vector,
        payload: Map<String, Value>,
    ) -> VectorStoreResult<()>;

    /// Remove `id`. Idempotent: deleting a missing ID logs but does not
    /// fail.
    async fn delete(&self, id: VectorId) -> VectorStoreResult<()>;

    /// Drop the entire collection, including any on-disk or remote state.
    async fn delete_collection(&self) -> VectorStoreResult<()>;

    /// Enumerate entries, optionally filtered/limited, alongside the
    /// total count before limiting. Backends without a scan/cursor
    /// primitive fail fast with `InvalidArgument` rather than emulate via
    /// repeated search (spec §4.5 "List support").
    async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult>;

    /// Whether the store is currently between a successful `connect` and
    /// the next `disconnect`.
    fn is_connected(&self) -> bool;

    /// The backend tag, fixed at construction (spec §3 invariant 4).
    fn backend_type(&self) -> &str;

    /// The collection name, fixed at construction.
    fn collection_name(&self) -> &str;

    /// The configured vector dimension, fixed at construction.
    fn dimension(&self) -> usize;
}
