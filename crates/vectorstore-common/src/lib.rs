//! Common utilities shared across the vector store crates
//!
//! This crate provides shared ambient-stack functionality used by both
//! `vectorstore-config` and `vectorstore-core`: correlation IDs threaded
//! through every store operation's tracing events, error sanitization for
//! user-facing messages, and one-time environment/dotenv bootstrap.

pub mod error_sanitizer;
pub mod init;
pub mod tracing;

pub use init::initialize_environment;
pub use tracing::CorrelationId;
