//! Intent engine error types.
//!
//! The routing workflow, the condition compiler and the dispatcher surface
//! errors through [`IntentError`].  Collaborator failures arrive wrapped in
//! [`IntentError::Kernel`] only when no local recovery applies.

/// Unified error type for the intent engine.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    // -- Condition errors ----------------------------------------------------
    /// The condition text is not a pure combination of comparisons over the
    /// source's fields.
    #[error("invalid condition: {reason}")]
    InvalidCondition { reason: String },

    // -- Workflow errors ------------------------------------------------------
    /// A terminal workflow stage could not produce a reply.
    #[error("workflow stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from a collaborator.
    #[error("collaborator error: {0}")]
    Kernel(#[from] rta_kernel::KernelError),

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal intent error: {0}")]
    Internal(String),
}

impl IntentError {
    /// Shorthand for an [`IntentError::InvalidCondition`].
    pub(crate) fn invalid_condition(reason: impl Into<String>) -> Self {
        Self::InvalidCondition {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
