//! RTA kernel.
//!
//! This crate holds the vocabulary shared by every other RTA crate:
//!
//! - **[`source`]** -- The data sources a request can target, with their
//!   fixed table schemas and stream endpoints.
//! - **[`services`]** -- Narrow, injectable interfaces to the external
//!   collaborators (query generation and execution, summarization, fallback
//!   answering, condition translation, telemetry streams, notification).
//! - **[`router`]** -- Pluggable intent classification with an
//!   aho-corasick backed keyword classifier for greeting and alert markers.
//! - **[`error`]** -- Unified kernel error types via [`thiserror`].
//!
//! All public types are `Send + Sync` and designed for use within a
//! multi-threaded tokio runtime.

pub mod error;
pub mod router;
pub mod services;
pub mod source;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{KernelError, Result};
pub use router::{IntentClassifier, KeywordClassifier, MatchMode};
pub use services::{
    CANNOT_ANSWER, ConditionTranslator, Conversationalist, FallbackAnswerer, Notifier, PayloadStream,
    QueryExecutor, QueryGenerator, Record, Summarizer, TelemetrySource,
};
pub use source::Source;
