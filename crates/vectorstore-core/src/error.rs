//! Error taxonomy for the vector store contract
//!
//! Every error carries an [`Operation`] tag identifying the call in
//! progress, and `BackendFailure`/`ConnectionFailed` additionally carry a
//! boxed `source` so the original remote error survives across layers
//! (spec §7 "Error chaining").

use std::fmt;

/// The operation in progress when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
    Insert,
    Search,
    Get,
    Update,
    Delete,
    DeleteCollection,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Insert => "insert",
            Self::Search => "search",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteCollection => "delete_collection",
            Self::List => "list",
        };
        f.write_str(label)
    }
}

/// Sub-classification of a connection failure, so callers can decide
/// whether to retry (spec §4.5 "Connection-error mapping").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailureKind {
    /// The remote endpoint could not be reached at all.
    Unreachable,
    /// Credentials were rejected.
    AuthenticationRejected,
    /// The engine is throttling requests.
    RateLimited,
    /// The collection exists with an incompatible schema (dimension/metric).
    SchemaMismatch,
}

impl fmt::Display for ConnectionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unreachable => "unreachable",
            Self::AuthenticationRejected => "authentication rejected",
            Self::RateLimited => "rate limited",
            Self::SchemaMismatch => "schema mismatch",
        };
        f.write_str(label)
    }
}

/// The vector store error taxonomy (spec §4.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    /// Operation requested before `connect` or after `disconnect`.
    #[error("store is not connected (operation: {operation})")]
    NotConnected { operation: Operation },

    /// Could not reach, authenticate with, or bind a schema-compatible
    /// collection on the backend.
    #[error("connection failed for backend {backend} ({kind}): {reason}")]
    ConnectionFailed {
        backend: String,
        kind: ConnectionFailureKind,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Vector length does not match the collection's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Named collection does not exist and auto-create is not permitted.
    #[error("collection not found: {name}")]
    CollectionNotFound { name: String },

    /// Malformed call: sequence-length mismatch, bad ID, empty name,
    /// or an operation the backend does not support.
    #[error("invalid argument ({operation}): {message}")]
    InvalidArgument { operation: Operation, message: String },

    /// The underlying remote engine reported a failure.
    #[error("backend failure during {operation}: {message}")]
    BackendFailure {
        operation: Operation,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl VectorStoreError {
    #[must_use]
    pub fn not_connected(operation: Operation) -> Self {
        Self::NotConnected { operation }
    }

    #[must_use]
    pub fn connection_failed(
        backend: impl Into<String>,
        kind: ConnectionFailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            backend: backend.into(),
            kind,
            reason: reason.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn connection_failed_with_source(
        backend: impl Into<String>,
        kind: ConnectionFailureKind,
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConnectionFailed {
            backend: backend.into(),
            kind,
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub const fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    #[must_use]
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    #[must_use]
    pub fn invalid_argument(operation: Operation, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn backend_failure(operation: Operation, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            operation,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn backend_failure_with_source(
        operation: Operation,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BackendFailure {
            operation,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The operation tag carried by this error, if any (all variants but
    /// `CollectionNotFound`/`DimensionMismatch` carry one).
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Self::NotConnected { operation }
            | Self::InvalidArgument { operation, .. }
            | Self::BackendFailure { operation, .. } => Some(*operation),
            Self::ConnectionFailed { .. }
            | Self::DimensionMismatch { .. }
            | Self::CollectionNotFound { .. } => None,
        }
    }

    /// A message safe to hand to an external caller: `ConnectionFailed`
    /// and `BackendFailure` may wrap a remote client's error (connection
    /// strings, auth details), so those two are routed through
    /// `vectorstore_common::error_sanitizer`, which logs the full detail
    /// under a correlation ID and returns only that ID to the caller.
    /// The other variants describe caller-supplied mistakes and are safe
    /// to surface as-is.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            Self::ConnectionFailed { backend, .. } => {
                vectorstore_common::error_sanitizer::sanitize_with_message(
                    self,
                    "vector_store_connect",
                    &format!("could not connect to the {backend} backend"),
                )
            }
            Self::BackendFailure { operation, .. } => {
                vectorstore_common::error_sanitizer::sanitize_with_message(
                    self,
                    "vector_store_backend_failure",
                    &format!("the {operation} operation failed"),
                )
            }
            other => other.to_string(),
        }
    }
}

/// Result type for all vector store operations.
pub type VectorStoreResult<T> = Result<T, VectorStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failed_message_does_not_leak_the_reason() {
        let err = VectorStoreError::connection_failed(
            "qdrant",
            ConnectionFailureKind::Unreachable,
            "dial tcp 10.0.0.5:6334: connection refused",
        );
        let message = err.user_facing_message();
        assert!(!message.contains("10.0.0.5"));
        assert!(message.contains("qdrant"));
    }

    #[test]
    fn invalid_argument_message_passes_through_unsanitized() {
        let err = VectorStoreError::invalid_argument(Operation::Insert, "length mismatch");
        assert_eq!(err.user_facing_message(), err.to_string());
    }
}
