//! Request dispatcher: the boundary between callers and the engine.
//!
//! A request either asks for continuous monitoring (detected by the alert
//! classifier) or is a question for the [`QueryWorkflow`].  Monitoring
//! requests are translated into a [`Condition`], bound to a new monitor
//! session, and acknowledged without waiting for a match.  Questions run
//! the workflow to completion.
//!
//! Errors that reach this boundary are logged and returned; the caller
//! never receives a partial reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use rta_kernel::{ConditionTranslator, IntentClassifier, KeywordClassifier, Record, Source};

use crate::condition::Condition;
use crate::error::Result;
use crate::monitor::{MonitorHandle, MonitorInfo, StreamMonitor};
use crate::workflow::QueryWorkflow;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// An inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub source: Source,
}

/// The reply to a request, with the query and its rows when one ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_result: Option<Vec<Record>>,
}

impl AskResponse {
    fn reply_only(reply: String) -> Self {
        Self {
            reply,
            query: None,
            query_result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestDispatcher
// ---------------------------------------------------------------------------

/// Routes requests to the workflow or to a new monitor session, and keeps
/// the handles of the sessions it started.
pub struct RequestDispatcher {
    workflow: QueryWorkflow,
    translator: Arc<dyn ConditionTranslator>,
    monitor: StreamMonitor,
    alerts: Arc<dyn IntentClassifier>,
    sessions: Mutex<Vec<MonitorHandle>>,
}

impl RequestDispatcher {
    /// Create a dispatcher using the built-in alert markers.
    pub fn new(
        workflow: QueryWorkflow,
        translator: Arc<dyn ConditionTranslator>,
        monitor: StreamMonitor,
    ) -> Self {
        Self {
            workflow,
            translator,
            monitor,
            alerts: Arc::new(KeywordClassifier::alerts()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Replace the alert-intent classifier.
    pub fn with_alert_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.alerts = classifier;
        self
    }

    /// Handle one request.
    pub async fn handle(&self, question: &str, source: Source) -> Result<AskResponse> {
        let monitoring = self.alerts.matches(question);
        info!(question, source = %source, monitoring, "request received");

        let result = if monitoring {
            self.start_monitor(question, source).await
        } else {
            self.answer(question, source).await
        };

        if let Err(e) = &result {
            error!(question, source = %source, error = %e, "request failed");
        }
        result
    }

    async fn answer(&self, question: &str, source: Source) -> Result<AskResponse> {
        let outcome = self.workflow.run(question, source).await?;
        let reply = outcome.reply().to_string();
        Ok(AskResponse {
            reply,
            query: outcome.state.query,
            query_result: outcome.state.query_result,
        })
    }

    async fn start_monitor(&self, instruction: &str, source: Source) -> Result<AskResponse> {
        let vocabulary = source.schema();
        let text = self.translator.translate(instruction, vocabulary).await?;
        let condition = Condition::compile(&text, vocabulary)?;
        let reply = format!("Alert set up. Monitoring the {source} stream for: {condition}.");

        let handle = self.monitor.spawn(condition, source);
        let mut sessions = self.sessions.lock().await;
        sessions.retain(MonitorHandle::is_running);
        sessions.push(handle);

        Ok(AskResponse::reply_only(reply))
    }

    /// The sessions still running; finished ones are dropped from the
    /// registry.
    pub async fn sessions(&self) -> Vec<MonitorInfo> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(MonitorHandle::is_running);
        sessions.iter().map(MonitorHandle::info).collect()
    }

    /// Number of running sessions.
    pub async fn active_sessions(&self) -> usize {
        self.sessions().await.len()
    }

    /// Request a cooperative stop of every session and wait for them.
    pub async fn stop_all(&self) {
        let handles: Vec<MonitorHandle> = self.sessions.lock().await.drain(..).collect();
        for handle in &handles {
            handle.stop();
        }
        for handle in handles {
            let id = handle.id();
            match handle.join().await {
                Ok(report) => info!(session_id = %id, end = ?report.end, "monitor session joined"),
                Err(e) => error!(session_id = %id, error = %e, "monitor session did not shut down cleanly"),
            }
        }
    }
}
