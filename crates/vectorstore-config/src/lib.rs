//! Environment-driven configuration for the vector store subsystem
//!
//! `VectorStoreConfig` binds the closed set of environment variables the
//! factory (`vectorstore-core::factory`) reads to select and construct a
//! backend, plus the companion reflection-collection override. Every field
//! has a documented default so the crate runs with zero configuration.

pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use validation::Validate;

use serde::{Deserialize, Serialize};

/// Default collection name used when `VECTOR_STORE_COLLECTION` is unset.
pub const DEFAULT_COLLECTION: &str = "default";
/// Default embedding dimension used when `VECTOR_STORE_DIMENSION` is unset.
pub const DEFAULT_DIMENSION: usize = 1536;
/// Default capacity bound for the in-process baseline.
pub const DEFAULT_MAX_VECTORS: usize = 10_000;
/// Default host for backends that take host/port rather than a full URL.
pub const DEFAULT_HOST: &str = "localhost";
/// Default distance metric.
pub const DEFAULT_DISTANCE: &str = "cosine";
/// Default on-disk-payload flag for backends that support the tradeoff.
pub const DEFAULT_ON_DISK: bool = false;

/// Which backend family to construct.
///
/// Parsed from `VECTOR_STORE_TYPE`; an unrecognized value falls back to
/// `Memory` with a logged warning rather than failing configuration load,
/// since the factory itself is responsible for surfacing connection
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Persistent,
    Qdrant,
    Pinecone,
    Mongo,
    Weaviate,
    Redis,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in-process" | "baseline" => Ok(Self::Memory),
            "persistent" | "local-persistent" => Ok(Self::Persistent),
            "qdrant" => Ok(Self::Qdrant),
            "pinecone" => Ok(Self::Pinecone),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "weaviate" => Ok(Self::Weaviate),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::Generic {
                message: format!("unrecognized VECTOR_STORE_TYPE: {other}"),
            }),
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Memory
    }
}

/// Configuration for a single vector store collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: BackendKind,
    pub collection_name: String,
    pub dimension: usize,
    pub max_vectors: usize,
    pub host: String,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub distance: String,
    pub on_disk: bool,
    pub namespace: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            collection_name: DEFAULT_COLLECTION.to_string(),
            dimension: DEFAULT_DIMENSION,
            max_vectors: DEFAULT_MAX_VECTORS,
            host: DEFAULT_HOST.to_string(),
            port: None,
            url: None,
            api_key: None,
            distance: DEFAULT_DISTANCE.to_string(),
            on_disk: DEFAULT_ON_DISK,
            namespace: None,
        }
    }
}

impl VectorStoreConfig {
    /// Build a config from the `VECTOR_STORE_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        vectorstore_common::initialize_environment();

        let backend = std::env::var("VECTOR_STORE_TYPE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let collection_name = std::env::var("VECTOR_STORE_COLLECTION")
            .unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        let dimension = std::env::var("VECTOR_STORE_DIMENSION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        let max_vectors = std::env::var("VECTOR_STORE_MAX_VECTORS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_VECTORS);

        let host =
            std::env::var("VECTOR_STORE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

        let port = std::env::var("VECTOR_STORE_PORT")
            .ok()
            .and_then(|s| s.parse().ok());

        let url = std::env::var("VECTOR_STORE_URL").ok();
        let api_key = std::env::var("VECTOR_STORE_API_KEY").ok();

        let distance = std::env::var("VECTOR_STORE_DISTANCE")
            .unwrap_or_else(|_| DEFAULT_DISTANCE.to_string());

        let on_disk = std::env::var("VECTOR_STORE_ON_DISK")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ON_DISK);

        let namespace = std::env::var("VECTOR_STORE_NAMESPACE").ok();

        Self {
            backend,
            collection_name,
            dimension,
            max_vectors,
            host,
            port,
            url,
            api_key,
            distance,
            on_disk,
            namespace,
        }
    }

    /// Build a config for the reflection collection, reusing the knowledge
    /// collection's backend and connection settings but overriding the
    /// collection name from `REFLECTION_VECTOR_STORE_COLLECTION`.
    #[must_use]
    pub fn reflection_from_env(knowledge: &Self) -> Self {
        let collection_name = std::env::var("REFLECTION_VECTOR_STORE_COLLECTION")
            .unwrap_or_else(|_| format!("{}_reflection", knowledge.collection_name));

        Self {
            collection_name,
            ..knowledge.clone()
        }
    }
}

impl Validate for VectorStoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.collection_name, "collection_name")?;
        validation::validate_range(self.dimension as u64, 1, 65536, "dimension")?;
        validation::validate_range(self.max_vectors as u64, 1, u64::MAX, "max_vectors")?;

        if let Some(port) = self.port {
            validation::validate_port(port, "port")?;
        }

        if let Some(url) = &self.url {
            validation::validate_url(url, "url")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = VectorStoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection_name, "default");
        assert_eq!(config.dimension, 1536);
    }

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("QDRANT".parse::<BackendKind>().unwrap(), BackendKind::Qdrant);
        assert_eq!("mongodb".parse::<BackendKind>().unwrap(), BackendKind::Mongo);
        assert!("bogus".parse::<BackendKind>().is_err());
    }

    #[test]
    fn reflection_config_derives_collection_name() {
        let knowledge = VectorStoreConfig {
            collection_name: "knowledge".to_string(),
            ..VectorStoreConfig::default()
        };
        let reflection = VectorStoreConfig::reflection_from_env(&knowledge);
        assert_eq!(reflection.collection_name, "knowledge_reflection");
        assert_eq!(reflection.backend, knowledge.backend);
    }

    #[test]
    fn zero_dimension_fails_validation() {
        let config = VectorStoreConfig {
            dimension: 0,
            ..VectorStoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_url_fails_validation() {
        let config = VectorStoreConfig {
            url: Some("not-a-url".to_string()),
            ..VectorStoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
