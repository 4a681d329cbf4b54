//! Query workflow: the request-routing state machine.
//!
//! ```text
//! Start → ClassifyIntent ─┬─ Greeting ─────────────────────────────┐
//!                         └─ TranslateQuery ─┬─ ExecuteQuery ─┬─ Summarize ─┤
//!                                            └─ Fallback      └─ Fallback   ├─ End
//! ```
//!
//! Each stage consumes the current [`WorkflowState`] and returns a new one
//! together with the next [`Stage`].  Collaborator failures before the
//! terminal stages are recovered locally by routing to `Fallback`; only a
//! failing `Fallback` surfaces as an error.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rta_kernel::{
    CANNOT_ANSWER, Conversationalist, FallbackAnswerer, IntentClassifier, KeywordClassifier,
    QueryExecutor, QueryGenerator, Record, Source, Summarizer,
};

use crate::condition::strip_fences;
use crate::error::{IntentError, Result};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    ClassifyIntent,
    Greeting,
    TranslateQuery,
    ExecuteQuery,
    Summarize,
    Fallback,
    End,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::ClassifyIntent => "classify_intent",
            Self::Greeting => "greeting",
            Self::TranslateQuery => "translate_query",
            Self::ExecuteQuery => "execute_query",
            Self::Summarize => "summarize",
            Self::Fallback => "fallback",
            Self::End => "end",
        })
    }
}

/// Per-request data threaded through the stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub question: String,
    pub source: Source,
    /// The sanitized query, once one has been produced.
    pub query: Option<String>,
    /// The executed query's rows; empty when execution failed.
    pub query_result: Option<Vec<Record>>,
    pub reply: Option<String>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, source: Source) -> Self {
        Self {
            question: question.into(),
            source,
            query: None,
            query_result: None,
            reply: None,
        }
    }

    fn with_query(self, query: String) -> Self {
        Self {
            query: Some(query),
            ..self
        }
    }

    fn with_result(self, rows: Vec<Record>) -> Self {
        Self {
            query_result: Some(rows),
            ..self
        }
    }

    fn with_reply(self, reply: String) -> Self {
        Self {
            reply: Some(reply),
            ..self
        }
    }
}

/// The final state of a run and the stages it visited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub state: WorkflowState,
    pub path: Vec<Stage>,
}

impl WorkflowOutcome {
    /// The reply text; every completed run has one.
    pub fn reply(&self) -> &str {
        self.state.reply.as_deref().unwrap_or_default()
    }

    /// Whether the run passed through `stage`.
    pub fn visited(&self, stage: Stage) -> bool {
        self.path.contains(&stage)
    }

    /// The terminal stage that produced the reply.
    pub fn terminal(&self) -> Option<Stage> {
        self.path
            .iter()
            .rev()
            .find(|s| matches!(s, Stage::Greeting | Stage::Summarize | Stage::Fallback))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// The collaborators a [`QueryWorkflow`] delegates to.
#[derive(Clone)]
pub struct WorkflowServices {
    pub generator: Arc<dyn QueryGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub summarizer: Arc<dyn Summarizer>,
    pub fallback: Arc<dyn FallbackAnswerer>,
    pub conversation: Arc<dyn Conversationalist>,
}

// ---------------------------------------------------------------------------
// QueryWorkflow
// ---------------------------------------------------------------------------

/// The routing pipeline.  Holds no per-request state; one instance serves
/// any number of concurrent runs.
pub struct QueryWorkflow {
    services: WorkflowServices,
    greetings: Arc<dyn IntentClassifier>,
}

impl QueryWorkflow {
    /// Create a workflow using the built-in greeting markers.
    pub fn new(services: WorkflowServices) -> Self {
        Self {
            services,
            greetings: Arc::new(KeywordClassifier::greetings()),
        }
    }

    /// Replace the greeting classifier.
    pub fn with_greeting_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.greetings = classifier;
        self
    }

    /// Run the pipeline to completion for one question.
    pub async fn run(&self, question: &str, source: Source) -> Result<WorkflowOutcome> {
        let mut state = WorkflowState::new(question, source);
        let mut stage = Stage::Start;
        let mut path = vec![stage];

        while stage != Stage::End {
            let (next_state, next) = self.step(stage, state).await?;
            debug!(from = %stage, to = %next, "workflow transition");
            state = next_state;
            stage = next;
            path.push(stage);
        }

        Ok(WorkflowOutcome { state, path })
    }

    async fn step(&self, stage: Stage, state: WorkflowState) -> Result<(WorkflowState, Stage)> {
        match stage {
            Stage::Start => Ok((state, Stage::ClassifyIntent)),
            Stage::ClassifyIntent => Ok(self.classify(state)),
            Stage::Greeting => Ok(self.greet(state).await),
            Stage::TranslateQuery => Ok(self.translate(state).await),
            Stage::ExecuteQuery => Ok(self.execute(state).await),
            Stage::Summarize => self.summarize(state).await,
            Stage::Fallback => self.fallback(state).await,
            Stage::End => Ok((state, Stage::End)),
        }
    }

    fn classify(&self, state: WorkflowState) -> (WorkflowState, Stage) {
        let next = if self.greetings.matches(&state.question) {
            Stage::Greeting
        } else {
            Stage::TranslateQuery
        };
        (state, next)
    }

    async fn greet(&self, state: WorkflowState) -> (WorkflowState, Stage) {
        match self.services.conversation.reply(&state.question).await {
            Ok(reply) if !reply.trim().is_empty() => {
                info!(stage = %Stage::Greeting, "workflow answered");
                (state.with_reply(reply), Stage::End)
            }
            Ok(_) => {
                warn!("conversational reply was empty, falling back");
                (state, Stage::Fallback)
            }
            Err(e) => {
                warn!(error = %e, "conversational reply failed, falling back");
                (state, Stage::Fallback)
            }
        }
    }

    async fn translate(&self, state: WorkflowState) -> (WorkflowState, Stage) {
        let schema = state.source.schema();
        match self
            .services
            .generator
            .generate(&state.question, state.source, schema)
            .await
        {
            Ok(text) if is_cannot_answer(&text) => {
                debug!(source = %state.source, "query generator declined");
                (state, Stage::Fallback)
            }
            Ok(text) => {
                debug!(query = %text, "query generated");
                (state.with_query(text), Stage::ExecuteQuery)
            }
            Err(e) => {
                warn!(error = %e, "query generation failed, falling back");
                (state, Stage::Fallback)
            }
        }
    }

    async fn execute(&self, state: WorkflowState) -> (WorkflowState, Stage) {
        let query = sanitize_query(state.query.as_deref().unwrap_or_default());
        if query.is_empty() {
            return (state, Stage::Fallback);
        }

        let rows = match self.services.executor.execute(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "query execution failed, treating result as empty");
                Vec::new()
            }
        };
        debug!(rows = rows.len(), "query executed");

        let next = if rows.is_empty() {
            Stage::Fallback
        } else {
            Stage::Summarize
        };
        (state.with_query(query).with_result(rows), next)
    }

    async fn summarize(&self, state: WorkflowState) -> Result<(WorkflowState, Stage)> {
        let rows = state.query_result.as_deref().unwrap_or_default();
        let serialized = serde_json::to_string(rows)?;

        match self
            .services
            .summarizer
            .summarize(&state.question, &serialized)
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => {
                info!(stage = %Stage::Summarize, rows = rows.len(), "workflow answered");
                Ok((state.with_reply(reply), Stage::End))
            }
            Ok(_) => {
                warn!("summary was empty, falling back");
                Ok((state, Stage::Fallback))
            }
            Err(e) => {
                warn!(error = %e, "summarization failed, falling back");
                Ok((state, Stage::Fallback))
            }
        }
    }

    async fn fallback(&self, state: WorkflowState) -> Result<(WorkflowState, Stage)> {
        let reply = self
            .services
            .fallback
            .answer(&state.question)
            .await
            .map_err(|e| IntentError::StageFailed {
                stage: Stage::Fallback.to_string(),
                reason: e.to_string(),
            })?;

        info!(stage = %Stage::Fallback, "workflow answered");
        Ok((state.with_reply(reply), Stage::End))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether generator output means "no query".
///
/// Empty output counts, as does either spelling of the marker.
pub fn is_cannot_answer(text: &str) -> bool {
    let text = text.trim();
    text.is_empty()
        || text.contains(CANNOT_ANSWER)
        || text.to_lowercase().contains("i cannot answer")
}

/// Reduce generator output to plain executable query text.
///
/// Strips a surrounding markdown code fence and removes one trailing `;`.
pub fn sanitize_query(raw: &str) -> String {
    let body = strip_fences(raw);
    body.strip_suffix(';').unwrap_or(body).trim_end().to_string()
}
