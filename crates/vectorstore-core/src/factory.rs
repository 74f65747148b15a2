//! Factory & Environment Binding (C7): backend selection, configuration
//! validation, and connect-with-fallback (spec §4.7)
//!
//! Grounded on
//! `pagi_core::knowledge::vector_store::create_vector_store`'s
//! try-remote-then-fall-back-to-local shape: attempt the configured
//! backend's `connect`, and on a connection failure substitute the
//! in-process baseline with the same identity rather than propagate.

use crate::backends::{MemoryStore, MongoBackend, PersistentStore, PineconeBackend, QdrantBackend, RedisBackend, WeaviateBackend};
use crate::error::{VectorStoreError, VectorStoreResult};
use crate::manager::ManagedStore;
use crate::store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;
use vectorstore_config::{BackendKind, Validate, VectorStoreConfig};

/// Base directory for the persistent backend's journal files when none is
/// configured via the environment.
const DEFAULT_PERSISTENT_BASE_DIR: &str = "./data/vectorstore";

fn build_backend(config: &VectorStoreConfig) -> VectorStoreResult<Arc<dyn VectorStore>> {
    let distance = config
        .distance
        .parse()
        .unwrap_or(crate::types::DistanceMetric::Cosine);

    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryStore::new(
            config.collection_name.clone(),
            config.dimension,
            config.max_vectors,
        ))),
        BackendKind::Persistent => Ok(Arc::new(PersistentStore::new(
            PathBuf::from(DEFAULT_PERSISTENT_BASE_DIR),
            config.collection_name.clone(),
            config.dimension,
            distance,
            config.max_vectors,
        ))),
        BackendKind::Qdrant => {
            let url = config.url.clone().unwrap_or_else(|| {
                format!("http://{}:{}", config.host, config.port.unwrap_or(6334))
            });
            Ok(Arc::new(QdrantBackend::new(
                &url,
                config.api_key.as_deref(),
                config.collection_name.clone(),
                config.dimension,
                distance,
            )?))
        }
        BackendKind::Pinecone => {
            let url = config.url.clone().ok_or_else(|| {
                VectorStoreError::invalid_argument(
                    crate::error::Operation::Connect,
                    "pinecone requires VECTOR_STORE_URL",
                )
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                VectorStoreError::invalid_argument(
                    crate::error::Operation::Connect,
                    "pinecone requires VECTOR_STORE_API_KEY",
                )
            })?;
            Ok(Arc::new(PineconeBackend::new(
                url,
                api_key,
                config.collection_name.clone(),
                config.namespace.clone().unwrap_or_else(|| "default".to_string()),
                config.dimension,
            )))
        }
        BackendKind::Mongo => {
            let url = config.url.clone().ok_or_else(|| {
                VectorStoreError::invalid_argument(
                    crate::error::Operation::Connect,
                    "mongo requires VECTOR_STORE_URL",
                )
            })?;
            // Connection is async; deferred into an async factory path.
            Err(VectorStoreError::backend_failure(
                crate::error::Operation::Connect,
                format!("mongo backend requires async construction via create_vector_store_async (url={url})"),
            ))
        }
        BackendKind::Weaviate => {
            let url = config.url.clone().ok_or_else(|| {
                VectorStoreError::invalid_argument(
                    crate::error::Operation::Connect,
                    "weaviate requires VECTOR_STORE_URL",
                )
            })?;
            Ok(Arc::new(WeaviateBackend::new(
                url,
                config.api_key.clone(),
                config.collection_name.clone(),
                config.dimension,
            )))
        }
        BackendKind::Redis => {
            let url = config.url.clone().unwrap_or_else(|| {
                format!("redis://{}:{}", config.host, config.port.unwrap_or(6379))
            });
            Ok(Arc::new(RedisBackend::new(
                &url,
                config.collection_name.clone(),
                config.dimension,
            )?))
        }
    }
}

/// Instantiate the backend described by `config`, wrap it in a Manager
/// Wrapper, and attempt to connect with fallback to the in-process
/// baseline (spec §4.7 "Connect-with-fallback").
///
/// # Errors
/// Propagates configuration validation failures (never covered by
/// fallback) and propagates the original connection error if the
/// baseline itself cannot connect.
pub async fn create_vector_store(config: VectorStoreConfig) -> VectorStoreResult<ManagedStore> {
    config.validate().map_err(|e| {
        VectorStoreError::invalid_argument(crate::error::Operation::Connect, e.to_string())
    })?;

    // MongoDB construction is async; handle it before the generic sync path.
    if config.backend == BackendKind::Mongo {
        return create_mongo_with_fallback(&config).await;
    }

    let backend = build_backend(&config)?;
    match backend.connect().await {
        Ok(()) => Ok(ManagedStore::new(backend)),
        Err(err @ VectorStoreError::ConnectionFailed { .. }) if config.backend != BackendKind::Memory => {
            tracing::warn!(
                backend = backend.backend_type(),
                error = %err,
                "connect failed, falling back to in-process baseline"
            );
            fallback_to_memory(&config).await
        }
        Err(other) => Err(other),
    }
}

async fn create_mongo_with_fallback(config: &VectorStoreConfig) -> VectorStoreResult<ManagedStore> {
    let url = config.url.clone().ok_or_else(|| {
        VectorStoreError::invalid_argument(
            crate::error::Operation::Connect,
            "mongo requires VECTOR_STORE_URL",
        )
    })?;

    match MongoBackend::new(&url, "vectorstore", config.collection_name.clone(), config.dimension).await {
        Ok(backend) => {
            let backend: Arc<dyn VectorStore> = Arc::new(backend);
            match backend.connect().await {
                Ok(()) => Ok(ManagedStore::new(backend)),
                Err(err) => {
                    tracing::warn!(error = %err, "mongo connect failed, falling back to in-process baseline");
                    fallback_to_memory(config).await
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "mongo client construction failed, falling back to in-process baseline");
            fallback_to_memory(config).await
        }
    }
}

async fn fallback_to_memory(config: &VectorStoreConfig) -> VectorStoreResult<ManagedStore> {
    let baseline: Arc<dyn VectorStore> = Arc::new(MemoryStore::new(
        config.collection_name.clone(),
        config.dimension,
        config.max_vectors,
    ));
    // No second fallback: if the baseline itself cannot connect, that is
    // a programming error worth propagating, not hiding.
    baseline.connect().await?;
    Ok(ManagedStore::with_fallback_flag(baseline, true))
}

/// Build and connect the in-process baseline directly, bypassing
/// configuration validation (spec §6 "`createDefaultVectorStore`").
///
/// # Errors
/// Propagates the baseline's connect failure, which in practice never
/// occurs for the in-process backend.
pub async fn create_default_vector_store(
    name: impl Into<String>,
    dimension: usize,
) -> VectorStoreResult<ManagedStore> {
    let backend: Arc<dyn VectorStore> = Arc::new(MemoryStore::new(
        name,
        dimension,
        vectorstore_config::DEFAULT_MAX_VECTORS,
    ));
    backend.connect().await?;
    Ok(ManagedStore::new(backend))
}

/// Read the `VECTOR_STORE_*` environment variables and build/connect the
/// described store with fallback (spec §6 "`createVectorStoreFromEnv`").
///
/// # Errors
/// See [`create_vector_store`].
pub async fn create_vector_store_from_env() -> VectorStoreResult<ManagedStore> {
    create_vector_store(get_vector_store_config_from_env()).await
}

/// Parse the environment into a [`VectorStoreConfig`] without connecting
/// (spec §6 "`getVectorStoreConfigFromEnv`").
#[must_use]
pub fn get_vector_store_config_from_env() -> VectorStoreConfig {
    VectorStoreConfig::from_env()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s5_unreachable_remote_falls_back_to_baseline() {
        let config = VectorStoreConfig {
            backend: BackendKind::Qdrant,
            collection_name: "s5".to_string(),
            dimension: 4,
            url: Some("http://127.0.0.1:1".to_string()),
            ..VectorStoreConfig::default()
        };
        let managed = create_vector_store(config).await.unwrap();
        let info = managed.info();
        assert_eq!(info.backend_type, "memory");
        assert!(info.fallback);
        assert!(managed.is_connected());
    }

    #[tokio::test]
    async fn invalid_configuration_is_never_covered_by_fallback() {
        let config = VectorStoreConfig {
            dimension: 0,
            ..VectorStoreConfig::default()
        };
        let err = create_vector_store(config).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn default_vector_store_uses_memory_backend() {
        let managed = create_default_vector_store("demo", 3).await.unwrap();
        assert_eq!(managed.info().backend_type, "memory");
        assert!(managed.is_connected());
    }
}
