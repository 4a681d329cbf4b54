//! Adapter error types.
//!
//! All transport collaborators surface errors through [`AdapterError`].
//! Each variant carries enough context for callers to decide how to handle
//! the failure without inspecting opaque strings.  At the collaborator
//! boundary they are converted into the matching [`KernelError`].

use rta_kernel::KernelError;

/// Unified error type for RTA transport adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An I/O operation failed within the adapter.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// An HTTP request could not be sent or its body could not be read.
    #[error("http error for `{endpoint}`: {reason}")]
    Http { endpoint: String, reason: String },

    /// The remote service answered with an error status.
    #[error("`{endpoint}` returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The remote service answered with a body of the wrong shape.
    #[error("unexpected response from `{endpoint}`: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    /// A TLS connection could not be established.
    #[error("tls error with {host}: {reason}")]
    Tls { host: String, reason: String },

    /// The SMTP server rejected a command.
    #[error("smtp error: expected {expected}xx, got {status}: {reply}")]
    Smtp {
        expected: u16,
        status: u16,
        reply: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An operation exceeded its time limit.
    #[error("timeout after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    /// Convert into a query-execution failure.
    pub fn into_execution(self) -> KernelError {
        match self {
            Self::ConfigError(reason) => KernelError::Config { reason },
            other => KernelError::QueryExecution {
                reason: other.to_string(),
            },
        }
    }

    /// Convert into a notification-delivery failure.
    pub fn into_delivery(self) -> KernelError {
        match self {
            Self::ConfigError(reason) => KernelError::Config { reason },
            other => KernelError::Delivery {
                reason: other.to_string(),
            },
        }
    }

    /// Convert into a stream transport failure for `source_name`.
    pub fn into_transport(self, source_name: impl Into<String>) -> KernelError {
        KernelError::StreamTransport {
            source_name: source_name.into(),
            reason: self.to_string(),
        }
    }
}
