//! Error types for sessions, codecs and transactions.
//!
//! The taxonomy mirrors how failures are handled by callers:
//!
//! - [`SessionError`]: configuration problems (bad TLS material), transport
//!   and RPC failures, and use of a closed session
//! - [`CodecError`]: an identifier or value that cannot be mapped to or from
//!   the wire model
//! - [`BrokerError`]: transaction misuse (finished transaction, wrong
//!   datastore) plus wrapped codec and session failures

use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type alias for transaction operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors raised by sessions and the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connection parameters are unusable (missing or malformed TLS material).
    #[error("Invalid session configuration for {field}: {message}")]
    Configuration {
        /// The parameter that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// The transport channel could not be built.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The remote target answered with a non-OK gRPC status.
    #[error("RPC failed with {}: {}", .0.code(), .0.message())]
    Rpc(#[from] tonic::Status),

    /// The session's channel has been shut down.
    #[error("Session to {address} is closed")]
    Closed {
        /// Address of the channel.
        address: String,
    },

    /// In-flight calls did not drain within the shutdown grace period.
    #[error("Channel to {address} did not shut down within {grace_ms}ms ({in_flight} calls in flight)")]
    ShutdownTimeout {
        /// Address of the channel.
        address: String,
        /// Grace period that elapsed.
        grace_ms: u64,
        /// Calls still running when the grace period elapsed.
        in_flight: usize,
    },

    /// The handle does not belong to a live session of this manager.
    #[error("Unknown or already closed session {0}")]
    UnknownSession(u64),
}

impl SessionError {
    /// Creates a configuration error.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if the target reported that the requested data does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::Rpc(status) if status.code() == tonic::Code::NotFound)
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Rpc(status) => matches!(
                status.code(),
                tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::Aborted
            ),
            _ => false,
        }
    }
}

/// Errors raised when mapping between the data tree and the wire model.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The identifier does not resolve against the schema context.
    #[error("Path {path} does not resolve against the schema context")]
    UnresolvedPath {
        /// Textual form of the identifier.
        path: String,
    },

    /// A wire path element or JSON member names no known schema node.
    #[error("Unknown element '{element}' under {parent}")]
    UnknownElement {
        /// The element name as received.
        element: String,
        /// The parent location.
        parent: String,
    },

    /// A namespace has no owning module in the schema context.
    #[error("No module owns namespace '{0}'")]
    UnknownNamespace(String),

    /// A key predicate is missing, unexpected or has an invalid value.
    #[error("Invalid key '{key}' on element '{element}': {message}")]
    InvalidKey {
        /// The list element.
        element: String,
        /// The key name.
        key: String,
        /// Error message.
        message: String,
    },

    /// A value does not fit the schema type of its node.
    #[error("Type mismatch at {path}: {message}")]
    TypeMismatch {
        /// Textual form of the identifier.
        path: String,
        /// Error message.
        message: String,
    },

    /// A value kind the bridge does not map (bytes, floats, ...).
    #[error("Unsupported value at {path}: {kind}")]
    UnsupportedValue {
        /// Textual form of the identifier.
        path: String,
        /// Description of the value kind.
        kind: String,
    },

    /// The textual path representation is malformed.
    #[error("Malformed path '{path}': {message}")]
    MalformedPath {
        /// The textual path.
        path: String,
        /// Error message.
        message: String,
    },

    /// The configured encoding is not a JSON encoding.
    #[error("Unsupported encoding '{0}' (only json and json_ietf are supported)")]
    UnsupportedEncoding(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Creates an unresolved path error.
    pub fn unresolved(path: impl ToString) -> Self {
        Self::UnresolvedPath {
            path: path.to_string(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(path: impl ToString, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(
        element: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidKey {
            element: element.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported value error.
    pub fn unsupported(path: impl ToString, kind: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            path: path.to_string(),
            kind: kind.into(),
        }
    }
}

/// Errors raised by transactions of the data broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The operation is not allowed on the given datastore.
    #[error("Invalid datastore '{store}' for {operation}")]
    InvalidDatastore {
        /// The attempted operation.
        operation: &'static str,
        /// The datastore that was targeted.
        store: String,
    },

    /// The transaction was already committed or cancelled.
    #[error("Transaction {id} already finished ({state})")]
    TransactionFinished {
        /// Transaction identifier.
        id: u64,
        /// How the transaction finished.
        state: &'static str,
    },

    /// The target accepted the Set RPC but reported a failure in-band.
    #[error("Set rejected by {device}: {message}")]
    SetRejected {
        /// Device identifier.
        device: String,
        /// Aggregated failure message.
        message: String,
    },

    /// Mapping to or from the wire model failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The underlying session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl BrokerError {
    /// Creates an invalid datastore error.
    pub fn invalid_datastore(operation: &'static str, store: impl ToString) -> Self {
        Self::InvalidDatastore {
            operation,
            store: store.to_string(),
        }
    }

    /// Returns true if the error was caused by reusing a finished transaction.
    pub fn is_finished(&self) -> bool {
        matches!(self, BrokerError::TransactionFinished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::configuration("tls.ca_bundle", "missing CA bundle");
        assert_eq!(
            err.to_string(),
            "Invalid session configuration for tls.ca_bundle: missing CA bundle"
        );

        let err = BrokerError::TransactionFinished {
            id: 7,
            state: "committed",
        };
        assert_eq!(err.to_string(), "Transaction 7 already finished (committed)");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(SessionError::Rpc(tonic::Status::not_found("no such path")).is_not_found());
        assert!(!SessionError::Rpc(tonic::Status::internal("boom")).is_not_found());
        assert!(!SessionError::UnknownSession(1).is_not_found());
    }

    #[test]
    fn test_is_retryable() {
        assert!(SessionError::Rpc(tonic::Status::unavailable("down")).is_retryable());
        assert!(!SessionError::Rpc(tonic::Status::invalid_argument("bad")).is_retryable());
        assert!(!SessionError::configuration("x", "y").is_retryable());
    }

    #[test]
    fn test_broker_error_wraps_codec() {
        let err: BrokerError = CodecError::unresolved("/foo").into();
        assert!(err.to_string().contains("/foo"));
        assert!(!err.is_finished());
    }
}
