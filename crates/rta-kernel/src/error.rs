//! Kernel error types.
//!
//! Every collaborator behind the interfaces in [`crate::services`] surfaces
//! its failures through [`KernelError`].  Each variant names the failing
//! collaborator so that callers can route the failure (fall back, skip,
//! terminate a session) without inspecting opaque strings.

/// Unified error type for collaborator calls and kernel utilities.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Collaborator errors ------------------------------------------------
    /// The query-generation collaborator failed.
    #[error("query generation failed: {reason}")]
    QueryGeneration { reason: String },

    /// The query-execution collaborator rejected or failed to run a query.
    #[error("query execution failed: {reason}")]
    QueryExecution { reason: String },

    /// The summarization collaborator failed.
    #[error("summarization failed: {reason}")]
    Summarization { reason: String },

    /// The open-domain answer or conversational collaborator failed.
    #[error("answer generation failed: {reason}")]
    Answer { reason: String },

    /// The condition translator failed to produce a condition.
    #[error("condition translation failed: {reason}")]
    Translation { reason: String },

    /// The notification channel could not deliver a message.
    #[error("notification delivery failed: {reason}")]
    Delivery { reason: String },

    /// The telemetry stream could not be opened or was interrupted.
    #[error("stream transport failed for {source_name}: {reason}")]
    StreamTransport { source_name: String, reason: String },

    // -- Input errors -------------------------------------------------------
    /// A data source name could not be recognised.
    #[error("unknown data source: {name}")]
    UnknownSource { name: String },

    /// A collaborator was constructed with incomplete configuration.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.  Prefer a typed variant whenever possible.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
