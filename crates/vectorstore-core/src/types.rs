//! Core data types shared by the store contract and every backend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A vector embedding. Length must equal the owning collection's dimension.
pub type Vector = Vec<f32>;

/// A non-negative integer vector identifier, unique within a collection.
pub type VectorId = u64;

/// Per-vector metadata. Restricted by convention to JSON objects at the
/// API boundary (spec §9 "recursive tagged variant").
pub type Payload = Map<String, Value>;

/// Distance metric a collection is indexed with (spec §3 "Collection").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    /// Inner product, referred to as "IP" or "dot" by various engines.
    Dot,
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "dot" | "ip" | "inner_product" | "innerproduct" => Ok(Self::Dot),
            other => Err(format!("unrecognized distance metric: {other}")),
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dot => "dot",
        };
        f.write_str(label)
    }
}

/// One row of a search/get result (spec §3 "Search Result").
///
/// Score convention: higher means more similar. A pure `get` uses the
/// conventional score of 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: VectorId,
    pub score: f32,
    pub payload: Payload,
    pub vector: Option<Vector>,
}

impl SearchResult {
    #[must_use]
    pub const fn exact(id: VectorId, payload: Payload, vector: Option<Vector>) -> Self {
        Self {
            id,
            score: 1.0,
            payload,
            vector,
        }
    }
}

/// `list`'s result: the matched page plus the total count before limiting
/// (spec §4.2 `list` row).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListResult {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
}

/// Static identity of a store, fixed at construction (spec §3 invariant 4).
#[derive(Debug, Clone, PartialEq)]
pub struct StoreIdentity {
    pub backend_type: String,
    pub collection_name: String,
    pub dimension: usize,
}
