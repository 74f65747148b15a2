//! Persistent exact-scan backend (C4): the in-process baseline extended
//! with a single-file on-disk journal and an external ANN index used to
//! accelerate `search` (spec §4.4).

mod index;
mod journal;

use crate::error::{Operation, VectorStoreError, VectorStoreResult};
use crate::filter::{self, SearchFilter};
use crate::types::{DistanceMetric, ListResult, Payload, SearchResult, Vector, VectorId};
use async_trait::async_trait;
use index::AnnIndex;
use journal::{Journal, JournalRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

struct Entry {
    vector: Vector,
    payload: Payload,
}

/// Baseline extended with durability and ANN search acceleration.
pub struct PersistentStore {
    collection_name: String,
    dimension: usize,
    distance: DistanceMetric,
    journal: Journal,
    entries: RwLock<HashMap<VectorId, Entry>>,
    index: AnnIndex,
    connected: std::sync::atomic::AtomicBool,
}

impl PersistentStore {
    #[must_use]
    pub fn new(
        base_dir: PathBuf,
        collection_name: impl Into<String>,
        dimension: usize,
        distance: DistanceMetric,
        max_vectors: usize,
    ) -> Self {
        let collection_name = collection_name.into();
        Self {
            journal: Journal::new(&base_dir, &collection_name),
            collection_name,
            dimension,
            distance,
            entries: RwLock::new(HashMap::new()),
            index: AnnIndex::new(max_vectors, distance),
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

    fn normalized(&self, vector: Vector) -> Vector {
        match self.distance {
            DistanceMetric::Cosine => {
                let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm == 0.0 {
                    vector
                } else {
                    vector.into_iter().map(|x| x / norm).collect()
                }
            }
            DistanceMetric::Euclidean | DistanceMetric::Dot => vector,
        }
    }

    fn score_from_raw(&self, raw: f32) -> f32 {
        match self.distance {
            DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - raw,
            DistanceMetric::Euclidean => 1.0 / (1.0 + raw),
        }
    }

    fn persist(&self, guard: &HashMap<VectorId, Entry>) -> VectorStoreResult<()> {
        let records: Vec<JournalRecord> = guard
            .iter()
            .map(|(id, entry)| JournalRecord {
                id: *id,
                vector: entry.vector.clone(),
                payload: entry.payload.clone(),
            })
            .collect();
        self.journal.save_all(&records)
    }

    fn rebuild_index(&self, guard: &HashMap<VectorId, Entry>) {
        let entries: Vec<(VectorId, Vector)> = guard
            .iter()
            .map(|(id, entry)| (*id, entry.vector.clone()))
            .collect();
        self.index.rebuild(&entries);
    }
}

#[async_trait]
impl crate::store::VectorStore for PersistentStore {
    #[tracing::instrument(skip(self), fields(collection = %self.collection_name))]
    async fn connect(&self) -> VectorStoreResult<()> {
        let records = self.journal.load()?;
        let mut guard = self.entries.write().expect("entries lock poisoned");
        guard.clear();
        for record in records {
            guard.insert(
                record.id,
                Entry {
                    vector: record.vector,
                    payload: record.payload,
                },
            );
        }
        self.rebuild_index(&guard);
        self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        tracing::info!(entries = guard.len(), "persistent store connected");
        Ok(())
    }

    async fn disconnect(&self) -> VectorStoreResult<()> {
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
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
            self.check_dimension(vector)?;
        }

        let mut guard = self.entries.write().expect("entries lock poisoned");
        for ((vector, id), payload) in vectors.into_iter().zip(ids).zip(payloads) {
            let normalized = self.normalized(vector);
            self.index.insert(id, &normalized);
            guard.insert(
                id,
                Entry {
                    vector: normalized,
                    payload,
                },
            );
        }
        self.persist(&guard)
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
        if guard.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.normalized(query);
        let candidates = self.index.search(&query, limit * 4, guard.len());

        let mut scored: Vec<(VectorId, f32)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let entry = guard.get(&candidate.id)?;
                if filter
                    .as_ref()
                    .is_some_and(|f| !filter::matches(f, &entry.payload))
                {
                    return None;
                }
                Some((candidate.id, self.score_from_raw(candidate.raw)))
            })
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
        let normalized = self.normalized(vector);
        let mut guard = self.entries.write().expect("entries lock poisoned");
        guard.insert(
            id,
            Entry {
                vector: normalized,
                payload,
            },
        );
        self.rebuild_index(&guard);
        self.persist(&guard)
    }

    async fn delete(&self, id: VectorId) -> VectorStoreResult<()> {
        self.require_connected(Operation::Delete)?;
        let mut guard = self.entries.write().expect("entries lock poisoned");
        if guard.remove(&id).is_none() {
            tracing::debug!(id, "delete of missing id is a no-op");
            return Ok(());
        }
        self.rebuild_index(&guard);
        self.persist(&guard)
    }

    async fn delete_collection(&self) -> VectorStoreResult<()> {
        self.require_connected(Operation::DeleteCollection)?;
        let mut guard = self.entries.write().expect("entries lock poisoned");
        guard.clear();
        self.rebuild_index(&guard);
        self.journal.delete_file()
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
        "persistent"
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
    use crate::store::VectorStore;
    use serde_json::json;

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn journal_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(
            dir.path().to_path_buf(),
            "coll",
            3,
            DistanceMetric::Cosine,
            100,
        );
        store.connect().await.unwrap();
        store
            .insert(vec![vec![1.0, 0.0, 0.0]], vec![1], vec![payload(&[("tag", json!("x"))])])
            .await
            .unwrap();
        store.disconnect().await.unwrap();

        let reopened = PersistentStore::new(
            dir.path().to_path_buf(),
            "coll",
            3,
            DistanceMetric::Cosine,
            100,
        );
        reopened.connect().await.unwrap();
        let got = reopened.get(1).await.unwrap().unwrap();
        assert_eq!(got.payload.get("tag"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn delete_then_search_never_returns_deleted_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(
            dir.path().to_path_buf(),
            "coll",
            2,
            DistanceMetric::Cosine,
            100,
        );
        store.connect().await.unwrap();
        store
            .insert(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![1, 2],
                vec![payload(&[]), payload(&[])],
            )
            .await
            .unwrap();
        store.delete(1).await.unwrap();
        let results = store.search(vec![1.0, 0.0], 5, None).await.unwrap();
        assert!(results.iter().all(|r| r.id != 1));
    }

    #[tokio::test]
    async fn delete_collection_removes_journal_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(
            dir.path().to_path_buf(),
            "coll",
            2,
            DistanceMetric::Cosine,
            100,
        );
        store.connect().await.unwrap();
        store
            .insert(vec![vec![1.0, 0.0]], vec![1], vec![payload(&[])])
            .await
            .unwrap();
        store.delete_collection().await.unwrap();
        let list = store.list(None, None).await.unwrap();
        assert_eq!(list.total_count, 0);
    }
}
