//! Integration tests for the rta-intent crate.
//!
//! These tests drive the workflow, the stream monitor and the dispatcher
//! against deterministic in-process collaborators.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use rta_intent::{
    Condition, IntentError, QueryWorkflow, RequestDispatcher, SessionEnd, Stage, StreamMonitor,
    WorkflowServices,
};
use rta_kernel::{
    ConditionTranslator, Conversationalist, FallbackAnswerer, KernelError, Notifier,
    PayloadStream, QueryExecutor, QueryGenerator, Record, Source, Summarizer, TelemetrySource,
};

// ═══════════════════════════════════════════════════════════════════════
//  Stub collaborators
// ═══════════════════════════════════════════════════════════════════════

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test records are objects"),
    }
}

/// Scripted stand-in for every language and query collaborator.
struct Stub {
    query: String,
    rows: Result<Vec<Record>, String>,
    summary_fails: bool,
    fallback_fails: bool,
    translation: String,

    generated: AtomicUsize,
    executed: Mutex<Vec<String>>,
    summarized: Mutex<Vec<String>>,
    fallbacks: AtomicUsize,
    greetings: AtomicUsize,
}

impl Stub {
    fn new() -> Self {
        Self {
            query: "```sql\nSELECT AVG(heart_rate) AS avg_heart_rate FROM healthcare_dataset;\n```"
                .into(),
            rows: Ok(vec![record(json!({"avg_heart_rate": 72}))]),
            summary_fails: false,
            fallback_fails: false,
            translation: "fire_alarm == 1".into(),
            generated: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            summarized: Mutex::new(Vec::new()),
            fallbacks: AtomicUsize::new(0),
            greetings: AtomicUsize::new(0),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn summarized(&self) -> Vec<String> {
        self.summarized.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryGenerator for Stub {
    async fn generate(
        &self,
        _question: &str,
        source: Source,
        schema: &[&str],
    ) -> rta_kernel::Result<String> {
        assert_eq!(schema, source.schema());
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(self.query.clone())
    }
}

#[async_trait]
impl QueryExecutor for Stub {
    async fn execute(&self, query: &str) -> rta_kernel::Result<Vec<Record>> {
        self.executed.lock().unwrap().push(query.to_string());
        self.rows
            .clone()
            .map_err(|reason| KernelError::QueryExecution { reason })
    }
}

#[async_trait]
impl Summarizer for Stub {
    async fn summarize(&self, _question: &str, result: &str) -> rta_kernel::Result<String> {
        self.summarized.lock().unwrap().push(result.to_string());
        if self.summary_fails {
            return Err(KernelError::Summarization {
                reason: "model unavailable".into(),
            });
        }
        Ok(format!("Summary of {result}"))
    }
}

#[async_trait]
impl FallbackAnswerer for Stub {
    async fn answer(&self, question: &str) -> rta_kernel::Result<String> {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        if self.fallback_fails {
            return Err(KernelError::Answer {
                reason: "model unavailable".into(),
            });
        }
        Ok(format!("General answer to: {question}"))
    }
}

#[async_trait]
impl Conversationalist for Stub {
    async fn reply(&self, _message: &str) -> rta_kernel::Result<String> {
        self.greetings.fetch_add(1, Ordering::SeqCst);
        Ok("Hello! Ask me about your data.".into())
    }
}

#[async_trait]
impl ConditionTranslator for Stub {
    async fn translate(&self, _instruction: &str, vocabulary: &[&str]) -> rta_kernel::Result<String> {
        assert!(!vocabulary.is_empty());
        Ok(self.translation.clone())
    }
}

/// Telemetry source fed from a test-controlled channel.
struct ChannelTelemetry {
    rx: Mutex<Option<mpsc::UnboundedReceiver<rta_kernel::Result<String>>>>,
}

impl ChannelTelemetry {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<rta_kernel::Result<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
        });
        (source, tx)
    }
}

#[async_trait]
impl TelemetrySource for ChannelTelemetry {
    async fn subscribe(&self, source: Source) -> rta_kernel::Result<PayloadStream> {
        let rx = self.rx.lock().unwrap().take().ok_or_else(|| KernelError::StreamTransport {
            source_name: source.to_string(),
            reason: "already subscribed".into(),
        })?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

/// Notifier that records messages and fails the first `fail_first` sends.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    fail_first: usize,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> rta_kernel::Result<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(KernelError::Delivery {
                reason: "mailbox unavailable".into(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((subject.to_string(), body.to_string()));
        Ok(format!("250 OK id={}", sent.len()))
    }
}

fn workflow(stub: &Arc<Stub>) -> QueryWorkflow {
    QueryWorkflow::new(WorkflowServices {
        generator: stub.clone(),
        executor: stub.clone(),
        summarizer: stub.clone(),
        fallback: stub.clone(),
        conversation: stub.clone(),
    })
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ═══════════════════════════════════════════════════════════════════════
//  QueryWorkflow
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn greeting_skips_query_generation() {
    let stub = Arc::new(Stub::new());
    let outcome = workflow(&stub).run("hello there", Source::Iot).await.unwrap();

    assert_eq!(
        outcome.path,
        vec![Stage::Start, Stage::ClassifyIntent, Stage::Greeting, Stage::End]
    );
    assert_eq!(outcome.reply(), "Hello! Ask me about your data.");
    assert!(outcome.state.query.is_none());
    assert!(outcome.state.query_result.is_none());
    assert_eq!(stub.generated.load(Ordering::SeqCst), 0);
    assert!(stub.executed().is_empty());
}

#[tokio::test]
async fn data_question_is_summarized() {
    let stub = Arc::new(Stub::new());
    let outcome = workflow(&stub)
        .run("average heart rate last hour", Source::Healthcare)
        .await
        .unwrap();

    assert_eq!(outcome.terminal(), Some(Stage::Summarize));
    assert!(!outcome.reply().is_empty());
    assert_eq!(
        stub.executed(),
        vec!["SELECT AVG(heart_rate) AS avg_heart_rate FROM healthcare_dataset"]
    );
    assert_eq!(stub.summarized(), vec![r#"[{"avg_heart_rate":72}]"#]);
    assert_eq!(
        outcome.state.query.as_deref(),
        Some("SELECT AVG(heart_rate) AS avg_heart_rate FROM healthcare_dataset")
    );
    assert_eq!(outcome.state.query_result.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn cannot_answer_marker_goes_to_fallback() {
    for marker in ["I_CANNOT_ANSWER", "", "  ", "I cannot answer this question."] {
        let stub = Arc::new(Stub {
            query: marker.into(),
            ..Stub::new()
        });
        let outcome = workflow(&stub)
            .run("who won the 1998 world cup", Source::Stock)
            .await
            .unwrap();

        assert!(outcome.visited(Stage::Fallback), "marker {marker:?}");
        assert!(!outcome.visited(Stage::ExecuteQuery));
        assert!(stub.executed().is_empty());
        assert!(outcome.reply().starts_with("General answer to:"));
    }
}

#[tokio::test]
async fn empty_result_goes_to_fallback() {
    let stub = Arc::new(Stub {
        rows: Ok(Vec::new()),
        ..Stub::new()
    });
    let outcome = workflow(&stub)
        .run("max temperature yesterday", Source::Iot)
        .await
        .unwrap();

    assert!(outcome.visited(Stage::ExecuteQuery));
    assert!(!outcome.visited(Stage::Summarize));
    assert_eq!(outcome.terminal(), Some(Stage::Fallback));
    assert!(stub.summarized().is_empty());
}

#[tokio::test]
async fn execution_error_is_recovered_by_fallback() {
    let stub = Arc::new(Stub {
        rows: Err("relation does not exist".into()),
        ..Stub::new()
    });
    let outcome = workflow(&stub)
        .run("average heart rate last hour", Source::Healthcare)
        .await
        .unwrap();

    assert_eq!(outcome.terminal(), Some(Stage::Fallback));
    assert!(!outcome.reply().is_empty());
    assert_eq!(outcome.state.query_result, Some(Vec::new()));
    assert_eq!(stub.fallbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn summarizer_failure_is_recovered_by_fallback() {
    let stub = Arc::new(Stub {
        summary_fails: true,
        ..Stub::new()
    });
    let outcome = workflow(&stub)
        .run("average heart rate last hour", Source::Healthcare)
        .await
        .unwrap();

    assert!(outcome.visited(Stage::Summarize));
    assert_eq!(outcome.terminal(), Some(Stage::Fallback));
}

#[tokio::test]
async fn fallback_failure_is_an_error() {
    let stub = Arc::new(Stub {
        query: "I_CANNOT_ANSWER".into(),
        fallback_fails: true,
        ..Stub::new()
    });
    let err = workflow(&stub)
        .run("what is the capital of France", Source::Iot)
        .await
        .unwrap_err();

    assert!(matches!(err, IntentError::StageFailed { ref stage, .. } if stage == "fallback"));
}

#[tokio::test]
async fn identical_runs_give_identical_replies() {
    let stub = Arc::new(Stub::new());
    let wf = workflow(&stub);
    let first = wf.run("average heart rate last hour", Source::Healthcare).await.unwrap();
    let second = wf.run("average heart rate last hour", Source::Healthcare).await.unwrap();
    assert_eq!(first.reply(), second.reply());
    assert_eq!(first, second);
}

// ═══════════════════════════════════════════════════════════════════════
//  StreamMonitor
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn monitor_notifies_once_per_match() {
    let (telemetry, tx) = ChannelTelemetry::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = StreamMonitor::new(telemetry, notifier.clone());
    let condition = Condition::compile("temperature > 50", Source::Iot.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Iot);
    for payload in [
        r#"{"Temperature[C]": 61.2}"#,
        r#"{"Temperature[C]": 20}"#,
        "End of data",
        r#"[1, 2, 3]"#,
        r#"{"Temperature[C]": "55"}"#,
        r#"{"Humidity[%]": 10}"#,
    ] {
        tx.send(Ok(payload.to_string())).unwrap();
    }
    drop(tx);

    let report = handle.join().await.unwrap();
    assert_eq!(report.end, SessionEnd::StreamClosed);
    assert_eq!(report.records_seen, 6);
    assert_eq!(report.malformed, 2);
    assert_eq!(report.matches, 2);
    assert_eq!(report.notifications_sent, 2);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, "Custom Alert Triggered");
    assert!(sent[0].1.starts_with("Reason: Condition met: temperature > 50\n\nData:\n"));
}

#[tokio::test]
async fn monitor_matches_particulate_columns_on_raw_iot_keys() {
    let (telemetry, tx) = ChannelTelemetry::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = StreamMonitor::new(telemetry, notifier.clone());
    let condition = Condition::compile("pm1 > 10 and nc1_0 > 5", Source::Iot.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Iot);
    for (pm1, nc1) in [("55.3", "12.0"), ("0.0", "0.0")] {
        let payload = json!({
            "UTC": "1654733331",
            "Temperature[C]": "20.0",
            "PM1.0": pm1,
            "PM2.5": "57.1",
            "NC1.0": nc1,
            "Fire Alarm": "0",
        });
        tx.send(Ok(payload.to_string())).unwrap();
    }
    drop(tx);

    let report = handle.join().await.unwrap();
    assert_eq!(report.records_seen, 2);
    assert_eq!(report.malformed, 0);
    assert_eq!(report.matches, 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("pm1 > 10 and nc1_0 > 5"));
}

#[tokio::test]
async fn delivery_failure_does_not_stop_monitoring() {
    let (telemetry, tx) = ChannelTelemetry::new();
    let notifier = Arc::new(RecordingNotifier {
        fail_first: 1,
        ..Default::default()
    });
    let monitor = StreamMonitor::new(telemetry, notifier.clone());
    let condition = Condition::compile("fire_alarm == 1", Source::Iot.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Iot);
    tx.send(Ok(r#"{"Fire Alarm": 1}"#.into())).unwrap();
    tx.send(Ok(r#"{"Fire Alarm": 1}"#.into())).unwrap();
    drop(tx);

    let report = handle.join().await.unwrap();
    assert_eq!(report.matches, 2);
    assert_eq!(report.delivery_failures, 1);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn transport_failure_ends_the_session() {
    let (telemetry, tx) = ChannelTelemetry::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = StreamMonitor::new(telemetry, notifier.clone());
    let condition = Condition::compile("fire_alarm == 1", Source::Iot.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Iot);
    tx.send(Err(KernelError::StreamTransport {
        source_name: "IoT".into(),
        reason: "connection reset".into(),
    }))
    .unwrap();
    tx.send(Ok(r#"{"fire_alarm": 1}"#.into())).unwrap();

    let report = handle.join().await.unwrap();
    assert_eq!(report.end, SessionEnd::TransportFailure);
    assert_eq!(report.records_seen, 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn subscribe_failure_ends_the_session() {
    let (telemetry, _tx) = ChannelTelemetry::new();
    telemetry.rx.lock().unwrap().take();
    let monitor = StreamMonitor::new(telemetry, Arc::new(RecordingNotifier::default()));
    let condition = Condition::compile("fire_alarm == 1", Source::Iot.schema()).unwrap();

    let report = monitor.spawn(condition, Source::Iot).join().await.unwrap();
    assert_eq!(report.end, SessionEnd::TransportFailure);
}

#[tokio::test]
async fn stop_ends_an_idle_session() {
    let (telemetry, _tx) = ChannelTelemetry::new();
    let monitor = StreamMonitor::new(telemetry, Arc::new(RecordingNotifier::default()));
    let condition = Condition::compile("vix > 30", Source::Stock.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Stock);
    assert!(handle.is_running());
    assert_eq!(handle.info().condition, "vix > 30");

    handle.stop();
    let report = tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("session should stop promptly")
        .unwrap();
    assert_eq!(report.end, SessionEnd::Stopped);
}

#[tokio::test]
async fn join_or_stop_returns_report_of_finished_session() {
    let (telemetry, tx) = ChannelTelemetry::new();
    let monitor = StreamMonitor::new(telemetry, Arc::new(RecordingNotifier::default()));
    let condition = Condition::compile("heart_rate > 120", Source::Healthcare.schema()).unwrap();

    let handle = monitor.spawn(condition, Source::Healthcare);
    tx.send(Ok(r#"{"Heart Rate": 80}"#.into())).unwrap();
    drop(tx);

    let report = handle
        .join_or_stop(futures::future::pending::<()>())
        .await
        .unwrap();
    assert_eq!(report.end, SessionEnd::StreamClosed);
    assert_eq!(report.records_seen, 1);
}

#[tokio::test]
async fn join_or_stop_stops_on_interrupt() {
    let (telemetry, _tx) = ChannelTelemetry::new();
    let monitor = StreamMonitor::new(telemetry, Arc::new(RecordingNotifier::default()));
    let condition = Condition::compile("vix > 30", Source::Stock.schema()).unwrap();

    let interrupt = tokio::time::sleep(Duration::from_millis(20));
    let report = monitor
        .spawn(condition, Source::Stock)
        .join_or_stop(interrupt)
        .await
        .unwrap();
    assert_eq!(report.end, SessionEnd::Stopped);
}

// ═══════════════════════════════════════════════════════════════════════
//  RequestDispatcher
// ═══════════════════════════════════════════════════════════════════════

fn dispatcher(
    stub: &Arc<Stub>,
) -> (
    RequestDispatcher,
    Arc<RecordingNotifier>,
    mpsc::UnboundedSender<rta_kernel::Result<String>>,
) {
    let (telemetry, tx) = ChannelTelemetry::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = StreamMonitor::new(telemetry, notifier.clone());
    let dispatcher = RequestDispatcher::new(workflow(stub), stub.clone(), monitor);
    (dispatcher, notifier, tx)
}

#[tokio::test]
async fn alert_request_is_acknowledged_and_notifies_on_match() {
    let stub = Arc::new(Stub::new());
    let (dispatcher, notifier, tx) = dispatcher(&stub);

    let response = dispatcher
        .handle("alert me if fire_alarm is 1", Source::Iot)
        .await
        .unwrap();
    assert!(response.reply.contains("fire_alarm == 1"));
    assert!(response.query.is_none());
    assert!(response.query_result.is_none());
    assert_eq!(stub.generated.load(Ordering::SeqCst), 0);

    let sessions = dispatcher.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].source, Source::Iot);

    tx.send(Ok(r#"{"fire_alarm": 1}"#.into())).unwrap();
    wait_for(|| notifier.sent().len() == 1).await;

    tx.send(Ok(r#"{"fire_alarm": 0}"#.into())).unwrap();
    drop(tx);

    dispatcher.stop_all().await;
    assert_eq!(notifier.sent().len(), 1);
    assert!(dispatcher.sessions().await.is_empty());
}

#[tokio::test]
async fn question_request_returns_query_and_rows() {
    let stub = Arc::new(Stub::new());
    let (dispatcher, _notifier, _tx) = dispatcher(&stub);

    let response = dispatcher
        .handle("average heart rate last hour", Source::Healthcare)
        .await
        .unwrap();
    assert!(response.reply.starts_with("Summary of"));
    assert!(response.query.is_some());
    assert_eq!(response.query_result.map(|rows| rows.len()), Some(1));
    assert!(dispatcher.sessions().await.is_empty());
}

#[tokio::test]
async fn untranslatable_alert_is_rejected() {
    let stub = Arc::new(Stub {
        translation: "os.system('reboot')".into(),
        ..Stub::new()
    });
    let (dispatcher, _notifier, _tx) = dispatcher(&stub);

    let err = dispatcher
        .handle("notify me when the stock crashes", Source::Stock)
        .await
        .unwrap_err();
    assert!(matches!(err, IntentError::InvalidCondition { .. }));
    assert!(dispatcher.sessions().await.is_empty());
}

#[tokio::test]
async fn workflow_failure_surfaces_at_the_boundary() {
    let stub = Arc::new(Stub {
        rows: Ok(Vec::new()),
        fallback_fails: true,
        ..Stub::new()
    });
    let (dispatcher, _notifier, _tx) = dispatcher(&stub);

    let result = dispatcher.handle("max vix today", Source::Stock).await;
    assert!(result.is_err());
}
