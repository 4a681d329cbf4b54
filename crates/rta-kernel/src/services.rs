//! Collaborator interfaces.
//!
//! The routing workflow and the stream monitor never talk to a model, a
//! database, a mail server or a telemetry endpoint directly.  They hold
//! `Arc<dyn Trait>` handles to the services below, constructed explicitly
//! at startup and injected, so that tests can substitute deterministic
//! stubs.  Every call is fallible; none is retried by the core.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::source::Source;

/// One data record: a mapping from field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A live sequence of raw server-push payloads.
///
/// Each `Ok` item is the undecoded text of one event.  An `Err` item is a
/// transport-level failure; the stream yields nothing after it.  The stream
/// ends when the source closes the connection.
pub type PayloadStream = BoxStream<'static, Result<String>>;

/// Marker a [`QueryGenerator`] returns when the question cannot be answered
/// from the source's table.
pub const CANNOT_ANSWER: &str = "I_CANNOT_ANSWER";

/// Converts a natural-language question into a structured query.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Produce query text for `question` over `source`, whose table has the
    /// given ordered `schema`.  May return a cannot-answer marker instead.
    async fn generate(&self, question: &str, source: Source, schema: &[&str]) -> Result<String>;
}

/// Runs a structured query against the persistent store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute plain query text and return the resulting rows in order.
    async fn execute(&self, query: &str) -> Result<Vec<Record>>;
}

/// Turns query results into a natural-language reply.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `result` (serialized rows) as an answer to `question`.
    async fn summarize(&self, question: &str, result: &str) -> Result<String>;
}

/// Answers a question from general knowledge.
#[async_trait]
pub trait FallbackAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String>;
}

/// Replies to greetings and small talk.
#[async_trait]
pub trait Conversationalist: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String>;
}

/// Converts a free-text alert instruction into condition text.
#[async_trait]
pub trait ConditionTranslator: Send + Sync {
    /// Translate `instruction` using only the field names in `vocabulary`.
    async fn translate(&self, instruction: &str, vocabulary: &[&str]) -> Result<String>;
}

/// Opens live telemetry streams.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Connect to the server-push endpoint for `source`.
    async fn subscribe(&self, source: Source) -> Result<PayloadStream>;
}

/// Delivers alert notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification and return the channel's delivery id.
    async fn send(&self, subject: &str, body: &str) -> Result<String>;
}
