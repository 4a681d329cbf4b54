//! Agent error types.
//!
//! The LLM client and the assistant surface errors through [`AgentError`].
//! At the collaborator boundary each failure is converted into the
//! [`KernelError`] variant naming the operation that failed.

use rta_kernel::KernelError;

/// Unified error type for the LLM-backed collaborators.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<AgentError> for KernelError {
    /// Construction-time failures become configuration errors; anything
    /// else is attributed to the answer path.  Operation-specific call
    /// sites map errors themselves.
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::MissingApiKey { .. } | AgentError::ConfigError { .. } => {
                KernelError::Config {
                    reason: err.to_string(),
                }
            }
            other => KernelError::Answer {
                reason: other.to_string(),
            },
        }
    }
}
