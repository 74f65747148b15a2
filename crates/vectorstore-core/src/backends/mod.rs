//! Concrete [`crate::store::VectorStore`] implementations (C3–C5)

pub mod memory;
pub mod mongo;
pub mod persistent;
pub mod pinecone;
pub mod qdrant;
pub mod redis;
pub mod weaviate;

pub use memory::MemoryStore;
pub use mongo::MongoBackend;
pub use persistent::PersistentStore;
pub use pinecone::PineconeBackend;
pub use qdrant::QdrantBackend;
pub use redis::RedisBackend;
pub use weaviate::WeaviateBackend;
