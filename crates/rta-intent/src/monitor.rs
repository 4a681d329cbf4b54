//! Stream monitor: evaluate a live telemetry stream against one condition.
//!
//! [`StreamMonitor::spawn`] starts a monitor session as a background tokio
//! task and returns a [`MonitorHandle`] immediately.  The session pulls raw
//! payloads from the source's stream, normalizes each JSON object into a
//! [`TelemetryRecord`](crate::condition::TelemetryRecord), evaluates the
//! condition, and sends one notification per matching record.
//!
//! Malformed payloads are skipped and delivery failures are logged; neither
//! stops the session.  A transport failure ends it.  So does a cooperative
//! stop requested through the handle, which the loop checks before every
//! record.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rta_kernel::{Notifier, Record, Source, TelemetrySource};

use crate::condition::Condition;
use crate::error::{IntentError, Result};

/// Subject line of every alert notification.
pub const NOTIFY_SUBJECT: &str = "Custom Alert Triggered";

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a monitor session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The source closed the stream.
    StreamClosed,
    /// The stream could not be opened or was interrupted.
    TransportFailure,
    /// A stop was requested through the handle.
    Stopped,
}

/// Counters for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReport {
    /// Payloads received, including malformed ones.
    pub records_seen: u64,
    pub malformed: u64,
    pub matches: u64,
    pub notifications_sent: u64,
    pub delivery_failures: u64,
    pub end: SessionEnd,
}

impl MonitorReport {
    fn new() -> Self {
        Self {
            records_seen: 0,
            malformed: 0,
            matches: 0,
            notifications_sent: 0,
            delivery_failures: 0,
            end: SessionEnd::StreamClosed,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cooperative stop flag shared between a handle and its session.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    wake: Notify,
}

impl StopSignal {
    fn request(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // `notify_one` stores a permit, so a session that is not waiting
        // yet still observes the request on its next wait.
        self.wake.notify_one();
    }

    fn is_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// A serializable view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub id: Uuid,
    pub source: Source,
    /// The compiled condition, restated.
    pub condition: String,
    pub started_at: DateTime<Utc>,
    pub running: bool,
}

/// The caller's handle on a running monitor session.
pub struct MonitorHandle {
    id: Uuid,
    source: Source,
    condition: Condition,
    started_at: DateTime<Utc>,
    stop: Arc<StopSignal>,
    task: JoinHandle<MonitorReport>,
}

impl MonitorHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Whether the session task is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Ask the session to stop before its next record.
    pub fn stop(&self) {
        if self.is_running() {
            info!(session_id = %self.id, "monitor stop requested");
        }
        self.stop.request();
    }

    pub fn info(&self) -> MonitorInfo {
        MonitorInfo {
            id: self.id,
            source: self.source,
            condition: self.condition.to_string(),
            started_at: self.started_at,
            running: self.is_running(),
        }
    }

    /// Wait for the session to finish and return its report.
    pub async fn join(self) -> Result<MonitorReport> {
        let id = self.id;
        self.task.await.map_err(|e| join_error(id, e))
    }

    /// Wait for the session to finish, or stop it once `interrupt`
    /// resolves, and return its report.
    pub async fn join_or_stop<F>(mut self, interrupt: F) -> Result<MonitorReport>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            joined = &mut self.task => Some(joined),
            () = interrupt => None,
        };
        match finished {
            Some(joined) => joined.map_err(|e| join_error(self.id, e)),
            None => {
                self.stop();
                self.join().await
            }
        }
    }
}

fn join_error(id: Uuid, e: tokio::task::JoinError) -> IntentError {
    IntentError::Internal(format!("monitor session {id} failed: {e}"))
}

// ---------------------------------------------------------------------------
// StreamMonitor
// ---------------------------------------------------------------------------

/// Starts monitor sessions over injected stream and notification services.
#[derive(Clone)]
pub struct StreamMonitor {
    telemetry: Arc<dyn TelemetrySource>,
    notifier: Arc<dyn Notifier>,
}

impl StreamMonitor {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            telemetry,
            notifier,
        }
    }

    /// Start a session watching `source` for `condition`.
    ///
    /// Must be called from within a tokio runtime.  Returns without waiting
    /// for the stream to open.
    pub fn spawn(&self, condition: Condition, source: Source) -> MonitorHandle {
        let id = Uuid::now_v7();
        let stop = Arc::new(StopSignal::default());

        let session = MonitorSession {
            id,
            source,
            condition: condition.clone(),
            telemetry: Arc::clone(&self.telemetry),
            notifier: Arc::clone(&self.notifier),
            stop: Arc::clone(&stop),
        };

        info!(session_id = %id, source = %source, condition = %condition, "monitor session started");
        let task = tokio::spawn(session.run());

        MonitorHandle {
            id,
            source,
            condition,
            started_at: Utc::now(),
            stop,
            task,
        }
    }
}

/// One condition bound to one stream consumption loop.
struct MonitorSession {
    id: Uuid,
    source: Source,
    condition: Condition,
    telemetry: Arc<dyn TelemetrySource>,
    notifier: Arc<dyn Notifier>,
    stop: Arc<StopSignal>,
}

impl MonitorSession {
    async fn run(self) -> MonitorReport {
        let mut report = MonitorReport::new();

        let mut stream = match self.telemetry.subscribe(self.source).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "failed to open telemetry stream");
                report.end = SessionEnd::TransportFailure;
                return report;
            }
        };

        loop {
            if self.stop.is_requested() {
                report.end = SessionEnd::Stopped;
                break;
            }

            let item = tokio::select! {
                biased;
                _ = self.stop.wake.notified() => {
                    report.end = SessionEnd::Stopped;
                    break;
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(payload)) => self.process(&payload, &mut report).await,
                Some(Err(e)) => {
                    error!(session_id = %self.id, error = %e, "telemetry stream interrupted");
                    report.end = SessionEnd::TransportFailure;
                    break;
                }
                None => {
                    report.end = SessionEnd::StreamClosed;
                    break;
                }
            }
        }

        info!(
            session_id = %self.id,
            end = ?report.end,
            records = report.records_seen,
            matches = report.matches,
            "monitor session finished"
        );
        report
    }

    async fn process(&self, payload: &str, report: &mut MonitorReport) {
        report.records_seen += 1;

        let record: Record = match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                report.malformed += 1;
                warn!(session_id = %self.id, payload, "skipping non-object stream record");
                return;
            }
            Err(e) => {
                report.malformed += 1;
                warn!(session_id = %self.id, payload, error = %e, "skipping malformed stream record");
                return;
            }
        };

        let evaluation = self.condition.evaluate_raw(&record);
        if !evaluation.matched {
            if !evaluation.reason.is_empty() {
                debug!(session_id = %self.id, reason = %evaluation.reason, "record not evaluable");
            }
            return;
        }

        report.matches += 1;
        let body = notification_body(&evaluation.reason, &record);
        match self.notifier.send(NOTIFY_SUBJECT, &body).await {
            Ok(delivery_id) => {
                report.notifications_sent += 1;
                info!(session_id = %self.id, delivery_id = %delivery_id, "alert notification sent");
            }
            Err(e) => {
                report.delivery_failures += 1;
                warn!(session_id = %self.id, error = %e, "alert notification failed");
            }
        }
    }
}

/// Render the notification body for a matching record.
pub fn notification_body(reason: &str, record: &Record) -> String {
    let data = serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{record:?}"));
    format!("Reason: {reason}\n\nData:\n{data}")
}
