//! In-process exact-scan baseline (C3)
//!
//! Reference semantics for every other backend: exact cosine similarity
//! over a keyed map, deep-copy discipline on every read and write.
//! Grounded on `codetriever_vector_data::storage::mock::MockStorage`'s
//! `Arc<Mutex<..>>`-guarded state and test-assertion style, generalized
//! from code chunks to arbitrary vectors/payloads.

use crate::error::{Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{self, SearchFilter};
use crate::types::{ListResult, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

struct Entry {
    vector: Vector,
    payload: Map<String, Value>,
}

/// Exact brute-force backend (spec §4.3).
pub struct MemoryStore {
    collection_name: String,
    dimension: usize,
    max_vectors: usize,
    entries: RwLock<HashMap<VectorId, Entry>>,
    connected: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new(collection_name: impl Into<String>, dimension: usize, max_vectors: usize) -> Self {
        Self {
            collection_name: collection_name.into(),
            dimension,
            max_vectors,
            entries: RwLock::new(HashMap::new()),
            connected: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn require_connected(&self, operation: Operation) -> VectorStoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(VectorStoreError::not_connected(operation))
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> VectorStoreResult<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(VectorStoreError::dimension_mismatch(
                self.dimension,
                vector.len(),
            ))
        }
    }

    /// Current number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("entries lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity; zero-norm vectors are defined to score 0, never NaN
/// (spec §4.3).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl crate::store::VectorStore for MemoryStore {
    #[tracing::instrument(skip(self), fields(collection = %self.collection_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("memory store connected");
        Ok(())
    }

    async fn disconnect(&self) -> VectorStoreResult<()> {
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
        self.entries.write().expect("entries lock poisoned").clear();
        tracing::info!("memory store disconnected, data dropped");
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
                format!(
                    "vectors ({}), ids ({}), and payloads ({}) must have equal length",
                    vectors.len(),
                    ids.len(),
                    payloads.len()
                ),
            ));
        }

        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        let mut guard = self.entries.write().expect("entries lock poisoned");
        let incoming_new = ids.iter().filter(|id| !guard.contains_key(id)).count();
        if guard.len() + incoming_new > self.max_vectors {
            return Err(VectorStoreError::invalid_argument(
                Operation::Insert,
                format!(
                    "inserting {incoming_new} new vectors would exceed capacity {}",
                    self.max_vectors
                ),
            ));
        }

        for ((vector, id), payload) in vectors.into_iter().zip(ids).zip(payloads) {
            guard.insert(id, Entry { vector, payload });
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
        self.check_dimension(&query)?;

        if limit == 0 {
            return Err(VectorStoreError::invalid_argument(
                Operation::Search,
                "limit must be >= 1",
            ));
        }

        let guard = self.entries.read().expect("entries lock poisoned");
        let mut scored: Vec<(VectorId, f32)> = guard
            .iter()
            .filter(|(_, entry)| {
                filter
                    .as_ref()
                    .is_none_or(|f| filter::matches(f, &entry.payload))
            })
            .map(|(id, entry)| (*id, cosine_similarity(&query, &entry.vector)))
            .collect();

        scored.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.cmp(id_b))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(id, score)| {
                let entry = &guard[&id];
                SearchResult {
                    id,
                    score,
                    payload: entry.payload.clone(),
                    vector: Some(entry.vector.clone()),
                }
            })
            .collect())
    }

    async fn get(&self, id: VectorId) -> VectorStoreResult<Option<SearchResult>> {
        self.require_connected(Operation::Get)?;
        let guard = self.entries.read().expect("entries lock poisoned");
        Ok(guard
            .get(&id)
            .map(|entry| SearchResult::exact(id, entry.payload.clone(), Some(entry.vector.clone()))))
    }

    async fn update(
        &self,
        id: VectorId,
        vector: Vector,
        payload: Map<String, Value>,
    ) -> VectorStoreResult<()> {
        self.require_connected(Operation::Update)?;
        self.check_dimension(&vector)?;
        let mut guard = self.entries.write().expect("entries lock poisoned");
        guard.insert(id, Entry { vector, payload });
        Ok(())
    }

    async fn delete(&self, id: VectorId) -> VectorStoreResult<()> {
        self.require_connected(Operation::Delete)?;
        let mut guard = self.entries.write().expect("entries lock poisoned");
        if guard.remove(&id).is_none() {
            tracing::debug!(id, "delete of missing id is a no-op");
        }
        Ok(())
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        self.entries.write().expect("entries lock poisoned").clear();
        Ok(())
    }

    async fn list(
        &self,
        filter: Option<SearchFilter>,
        limit: Option<usize>,
    ) -> VectorStoreResult<ListResult> {
        self.require_connected(Operation::List)?;
        let guard = self.entries.read().expect("entries lock poisoned");
        let mut matching: Vec<VectorId> = guard
            .iter()
            .filter(|(_, entry)| {
                filter
                    .as_ref()
                    .is_none_or(|f| filter::matches(f, &entry.payload))
            })
            .map(|(id, _)| *id)
            .collect();
        matching.sort_unstable();
        let total_count = matching.len();
        if let Some(limit) = limit {
            matching.truncate(limit);
        }

        let results = matching
            .into_iter()
            .map(|id| {
                let entry = &guard[&id];
                SearchResult::exact(id, entry.payload.clone(), Some(entry.vector.clone()))
            })
            .collect();

        Ok(ListResult {
            results,
            total_count,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn backend_type(&self) -> &str {
        "memory"
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
    use crate::filter::FilterPredicate;
    use crate::store::VectorStore;
    use serde_json::json;

    fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn s1_baseline_round_trip() {
        let store = MemoryStore::new("S1", 3, 10);
        store.connect().await.unwrap();
        store
            .insert(
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
                vec![1, 2, 3],
                vec![
                    payload(&[("tag", json!("x"))]),
                    payload(&[("tag", json!("y"))]),
                    payload(&[("tag", json!("z"))]),
                ],
            )
            .await
            .unwrap();

        let results = store.search(vec![1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[1].id == 2 || results[1].id == 3);
        assert!(results[1].score.abs() < 1e-5);
    }

    #[tokio::test]
    async fn s2_filter_conjunction() {
        let store = MemoryStore::new("S2", 3, 10);
        store.connect().await.unwrap();
        store
            .insert(
                vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
                vec![1, 4],
                vec![
                    payload(&[("tag", json!("x"))]),
                    payload(&[("tag", json!("x")), ("rank", json!(5))]),
                ],
            )
            .await
            .unwrap();

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
        let results = store.search(vec![1.0, 0.0, 0.0], 10, Some(filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 4);
    }

    #[tokio::test]
    async fn s3_dimension_mismatch_leaves_state_unchanged() {
        let store = MemoryStore::new("S3", 3, 10);
        store.connect().await.unwrap();
        let before = store.len();
        let err = store
            .insert(vec![vec![1.0, 0.0]], vec![1], vec![payload(&[])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 3, actual: 2 }
        ));
        assert_eq!(store.len(), before);
    }

    #[tokio::test]
    async fn s4_update_and_delete() {
        let store = MemoryStore::new("S4", 3, 10);
        store.connect().await.unwrap();
        store
            .insert(
                vec![vec![0.1, 0.2, 0.3]],
                vec![7],
                vec![payload(&[("v", json!(1))])],
            )
            .await
            .unwrap();

        store
            .update(7, vec![0.9, 0.8, 0.7], payload(&[("v", json!(2))]))
            .await
            .unwrap();
        let got = store.get(7).await.unwrap().unwrap();
        assert_eq!(got.payload.get("v"), Some(&json!(2)));

        store.delete(7).await.unwrap();
        assert!(store.get(7).await.unwrap().is_none());
        // deleting again is a no-op, not an error
        store.delete(7).await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_rejects_subsequent_operations() {
        let store = MemoryStore::new("S5", 3, 10);
        store.connect().await.unwrap();
        store.disconnect().await.unwrap();
        let err = store.get(1).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn insert_length_mismatch_is_invalid_argument() {
        let store = MemoryStore::new("S6", 3, 10);
        store.connect().await.unwrap();
        let err = store
            .insert(vec![vec![1.0, 0.0, 0.0]], vec![1, 2], vec![payload(&[])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let store = MemoryStore::new("S7", 1, 1);
        store.connect().await.unwrap();
        store.insert(vec![vec![1.0]], vec![1], vec![payload(&[])]).await.unwrap();
        let err = store
            .insert(vec![vec![1.0]], vec![2], vec![payload(&[])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidArgument { .. }));
    }

    #[test]
    fn zero_norm_vector_scores_zero_not_nan() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
