//! Dual-Collection Manager (C8): a facade owning two independent stores
//! for the "knowledge" and "reflection" roles (spec §4.8)

use crate::error::{Operation, VectorStoreError, VectorStoreResult};
use crate::factory;
use crate::manager::{ManagedStore, StoreInfo};
use vectorstore_config::VectorStoreConfig;

/// Closed enum of collection roles (spec §4.8 "closed enum {knowledge,
/// reflection}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionRole {
    Knowledge,
    Reflection,
}

impl std::fmt::Display for CollectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Knowledge => "knowledge",
            Self::Reflection => "reflection",
        })
    }
}

/// Owns two independent [`ManagedStore`]s. Reflection is present only
/// when a reflection collection name was supplied (spec §4.8: "enabling
/// reflection is gated by the presence of a reflection-collection-name
/// variable").
pub struct DualCollectionManager {
    knowledge: ManagedStore,
    reflection: Option<ManagedStore>,
}

impl DualCollectionManager {
    /// Build both children from `knowledge_config` and, if
    /// `reflection_config` is supplied, from that too.
    ///
    /// # Errors
    /// Propagates construction/configuration errors from either child;
    /// connection failures are handled in [`Self::connect`], not here.
    pub async fn new(
        knowledge_config: VectorStoreConfig,
        reflection_config: Option<VectorStoreConfig>,
    ) -> VectorStoreResult<Self> {
        let knowledge = factory::create_vector_store(knowledge_config).await?;
        let reflection = match reflection_config {
            Some(config) => Some(factory::create_vector_store(config).await?),
            None => None,
        };
        Ok(Self {
            knowledge,
            reflection,
        })
    }

    /// Build from the environment: reflection is enabled iff
    /// `REFLECTION_VECTOR_STORE_COLLECTION` is set.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub async fn from_env() -> VectorStoreResult<Self> {
        let knowledge_config = factory::get_vector_store_config_from_env();
        let reflection_config = std::env::var("REFLECTION_VECTOR_STORE_COLLECTION")
            .ok()
            .map(|_| VectorStoreConfig::reflection_from_env(&knowledge_config));
        Self::new(knowledge_config, reflection_config).await
    }

    fn managed(&self, role: CollectionRole) -> Option<&ManagedStore> {
        match role {
            CollectionRole::Knowledge => Some(&self.knowledge),
            CollectionRole::Reflection => self.reflection.as_ref(),
        }
    }

    /// Connect both children. Succeeds iff the primary (knowledge)
    /// connects; a secondary failure degrades the facade rather than
    /// failing the call (spec §4.8).
    ///
    /// # Errors
    /// Only the knowledge child's connect failure is propagated.
    pub async fn connect(&self) -> VectorStoreResult<()> {
        self.knowledge.connect().await?;
        if let Some(reflection) = &self.reflection {
            if let Err(err) = reflection.connect().await {
                tracing::warn!(error = %err, "reflection collection failed to connect, degrading facade");
            }
        }
        Ok(())
    }

    /// Disconnect both children; best-effort, errors from one do not
    /// skip the other.
    pub async fn disconnect(&self) {
        if let Err(err) = self.knowledge.disconnect().await {
            tracing::warn!(error = %err, "knowledge disconnect failed");
        }
        if let Some(reflection) = &self.reflection {
            if let Err(err) = reflection.disconnect().await {
                tracing::warn!(error = %err, "reflection disconnect failed");
            }
        }
    }

    /// Get the store for `role`.
    ///
    /// # Errors
    /// Never fails for `Knowledge`; returns `CollectionNotFound` for
    /// `Reflection` when it was not configured.
    pub fn get_store(&self, role: CollectionRole) -> VectorStoreResult<&ManagedStore> {
        self.managed(role).ok_or_else(|| {
            VectorStoreError::invalid_argument(
                Operation::Get,
                format!("{role} collection is not configured"),
            )
        })
    }

    #[must_use]
    pub fn is_connected(&self, role: CollectionRole) -> bool {
        self.managed(role).is_some_and(ManagedStore::is_connected)
    }

    #[must_use]
    pub fn get_manager(&self, role: CollectionRole) -> Option<StoreInfo> {
        self.managed(role).map(ManagedStore::info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectorstore_config::BackendKind;

    #[tokio::test]
    async fn s6_dual_collection_independence() {
        let knowledge_config = VectorStoreConfig {
            backend: BackendKind::Memory,
            collection_name: "knowledge".to_string(),
            dimension: 3,
            ..VectorStoreConfig::default()
        };
        let reflection_config = VectorStoreConfig {
            collection_name: "reflection".to_string(),
            ..knowledge_config.clone()
        };

        let manager = DualCollectionManager::new(knowledge_config, Some(reflection_config))
            .await
            .unwrap();
        manager.connect().await.unwrap();

        manager
            .get_store(CollectionRole::Knowledge)
            .unwrap()
            .insert(
                vec![vec![1.0, 0.0, 0.0]],
                vec![1],
                vec![serde_json::Map::new()],
            )
            .await
            .unwrap();

        let reflection_list = manager
            .get_store(CollectionRole::Reflection)
            .unwrap()
            .list(None, None)
            .await
            .unwrap();
        assert_eq!(reflection_list.total_count, 0);

        assert!(manager.is_connected(CollectionRole::Knowledge));
        assert!(manager.is_connected(CollectionRole::Reflection));
    }

    #[tokio::test]
    async fn reflection_absent_when_not_configured() {
        let knowledge_config = VectorStoreConfig {
            collection_name: "knowledge".to_string(),
            dimension: 2,
            ..VectorStoreConfig::default()
        };
        let manager = DualCollectionManager::new(knowledge_config, None).await.unwrap();
        manager.connect().await.unwrap();

        assert!(!manager.is_connected(CollectionRole::Reflection));
        assert!(manager.get_store(CollectionRole::Reflection).is_err());
    }
}
