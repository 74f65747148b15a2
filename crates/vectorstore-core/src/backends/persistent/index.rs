//! External approximate-nearest-neighbor index for the persistent backend
//! (spec §4.4)
//!
//! Wraps `hnsw_rs`'s HNSW graph. The graph has no delete primitive, so
//! deletions rebuild the whole graph from the current population; this is
//! the "index rebuild of the mutated slot is permitted but not required"
//! allowance in spec §4.4, applied conservatively.
//!
//! `hnsw_rs`'s graph type is generic over its distance functor, so the
//! graph topology itself — not just the score conversion around it — must
//! match the collection's configured [`DistanceMetric`]; a cosine-built
//! graph ranks neighbors by cosine similarity regardless of what score
//! conversion is applied afterward.

use crate::types::{DistanceMetric, Vector, VectorId};
use hnsw_rs::prelude::*;
use std::sync::RwLock;

const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;

/// Candidate neighbor returned by the index, prior to projection back to
/// stored entries.
pub struct Candidate {
    pub id: VectorId,
    /// Raw distance/inner-product from the index, not yet converted to
    /// the canonical similarity score.
    pub raw: f32,
}

/// One graph per supported distance functor. Selected once at
/// construction from the collection's configured metric and never
/// switched afterward (spec §3 invariant 4: metric is fixed at
/// construction).
enum Graph {
    Cosine(RwLock<Hnsw<'static, f32, DistCosine>>),
    L2(RwLock<Hnsw<'static, f32, DistL2>>),
    Dot(RwLock<Hnsw<'static, f32, DistDot>>),
}

/// Thin wrapper holding the current HNSW graph plus enough metadata to
/// rebuild it.
pub struct AnnIndex {
    max_elements: usize,
    graph: Graph,
}

impl AnnIndex {
    #[must_use]
    pub fn new(max_elements: usize, distance: DistanceMetric) -> Self {
        let max_elements = max_elements.max(1);
        let graph = match distance {
            DistanceMetric::Cosine => Graph::Cosine(RwLock::new(Hnsw::new(
                MAX_NB_CONNECTION,
                max_elements,
                MAX_LAYER,
                EF_CONSTRUCTION,
                DistCosine {},
            ))),
            DistanceMetric::Euclidean => Graph::L2(RwLock::new(Hnsw::new(
                MAX_NB_CONNECTION,
                max_elements,
                MAX_LAYER,
                EF_CONSTRUCTION,
                DistL2 {},
            ))),
            DistanceMetric::Dot => Graph::Dot(RwLock::new(Hnsw::new(
                MAX_NB_CONNECTION,
                max_elements,
                MAX_LAYER,
                EF_CONSTRUCTION,
                DistDot {},
            ))),
        };
        Self {
            max_elements,
            graph,
        }
    }

    /// Rebuild the graph from scratch, e.g. on `connect` after loading the
    /// journal, or after a delete.
    pub fn rebuild(&self, entries: &[(VectorId, Vector)]) {
        let capacity = self.max_elements.max(entries.len()).max(1);
        match &self.graph {
            Graph::Cosine(lock) => {
                let mut graph = Hnsw::new(
                    MAX_NB_CONNECTION,
                    capacity,
                    MAX_LAYER,
                    EF_CONSTRUCTION,
                    DistCosine {},
                );
                for (id, vector) in entries {
                    graph.insert((vector, *id as usize));
                }
                *lock.write().expect("ann index lock poisoned") = graph;
            }
            Graph::L2(lock) => {
                let mut graph = Hnsw::new(
                    MAX_NB_CONNECTION,
                    capacity,
                    MAX_LAYER,
                    EF_CONSTRUCTION,
                    DistL2 {},
                );
                for (id, vector) in entries {
                    graph.insert((vector, *id as usize));
                }
                *lock.write().expect("ann index lock poisoned") = graph;
            }
            Graph::Dot(lock) => {
                let mut graph = Hnsw::new(
                    MAX_NB_CONNECTION,
                    capacity,
                    MAX_LAYER,
                    EF_CONSTRUCTION,
                    DistDot {},
                );
                for (id, vector) in entries {
                    graph.insert((vector, *id as usize));
                }
                *lock.write().expect("ann index lock poisoned") = graph;
            }
        }
    }

    /// Insert a single new vector without a full rebuild.
    pub fn insert(&self, id: VectorId, vector: &[f32]) {
        match &self.graph {
            Graph::Cosine(lock) => lock
                .write()
                .expect("ann index lock poisoned")
                .insert((vector, id as usize)),
            Graph::L2(lock) => lock
                .write()
                .expect("ann index lock poisoned")
                .insert((vector, id as usize)),
            Graph::Dot(lock) => lock
                .write()
                .expect("ann index lock poisoned")
                .insert((vector, id as usize)),
        }
    }

    /// Query capped at the current population (spec §4.4: "Never allow
    /// `limit` to exceed the current population of the index").
    #[must_use]
    pub fn search(&self, query: &[f32], limit: usize, population: usize) -> Vec<Candidate> {
        let capped = limit.min(population.max(1));
        match &self.graph {
            Graph::Cosine(lock) => lock
                .read()
                .expect("ann index lock poisoned")
                .search(query, capped, EF_SEARCH)
                .into_iter()
                .map(|neighbour| Candidate {
                    id: neighbour.d_id as VectorId,
                    raw: neighbour.distance,
                })
                .collect(),
            Graph::L2(lock) => lock
                .read()
                .expect("ann index lock poisoned")
                .search(query, capped, EF_SEARCH)
                .into_iter()
                .map(|neighbour| Candidate {
                    id: neighbour.d_id as VectorId,
                    raw: neighbour.distance,
                })
                .collect(),
            Graph::Dot(lock) => lock
                .read()
                .expect("ann index lock poisoned")
                .search(query, capped, EF_SEARCH)
                .into_iter()
                .map(|neighbour| Candidate {
                    id: neighbour.d_id as VectorId,
                    raw: neighbour.distance,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_then_search_finds_inserted_vector() {
        let index = AnnIndex::new(16, DistanceMetric::Cosine);
        index.rebuild(&[(1, vec![1.0, 0.0, 0.0]), (2, vec![0.0, 1.0, 0.0])]);
        let results = index.search(&[1.0, 0.0, 0.0], 1, 2);
        assert_eq!(results.first().map(|c| c.id), Some(1));
    }

    #[test]
    fn euclidean_graph_ranks_by_l2_not_cosine() {
        // Collinear with the query but far away should lose to a closer,
        // non-collinear point under Euclidean distance.
        let index = AnnIndex::new(16, DistanceMetric::Euclidean);
        index.rebuild(&[(1, vec![10.0, 0.0]), (2, vec![1.0, 0.5])]);
        let results = index.search(&[1.0, 0.0], 1, 2);
        assert_eq!(results.first().map(|c| c.id), Some(2));
    }
}
