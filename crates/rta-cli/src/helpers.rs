//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization and the construction of every service
//! from [`AppConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use rta_adapters::{SmtpNotifier, SseTelemetrySource, SupabaseExecutor};
use rta_agent::{LlmAssistant, LlmClient};
use rta_intent::{QueryWorkflow, RequestDispatcher, StreamMonitor, WorkflowServices};
use rta_kernel::{IntentClassifier, KeywordClassifier, MatchMode};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Service construction
// ---------------------------------------------------------------------------

pub fn build_assistant(config: &AppConfig) -> Result<Arc<LlmAssistant>> {
    let client = LlmClient::new(config.llm_client_config()).context("LLM client")?;
    Ok(Arc::new(LlmAssistant::new(Arc::new(client))))
}

pub fn build_workflow(config: &AppConfig, assistant: &Arc<LlmAssistant>) -> Result<QueryWorkflow> {
    let executor = SupabaseExecutor::new(config.supabase_config()).context("Supabase executor")?;
    let workflow = QueryWorkflow::new(WorkflowServices {
        generator: assistant.clone(),
        executor: Arc::new(executor),
        summarizer: assistant.clone(),
        fallback: assistant.clone(),
        conversation: assistant.clone(),
    });

    Ok(match marker_classifier(config.routing.greeting_markers.as_deref()) {
        Some(classifier) => workflow.with_greeting_classifier(classifier),
        None => workflow,
    })
}

pub fn build_monitor(config: &AppConfig) -> Result<StreamMonitor> {
    let telemetry =
        SseTelemetrySource::new(config.stream.base_url.clone()).context("telemetry source")?;
    let notifier = SmtpNotifier::new(config.smtp_config()).context("SMTP notifier")?;
    Ok(StreamMonitor::new(Arc::new(telemetry), Arc::new(notifier)))
}

pub fn build_dispatcher(config: &AppConfig) -> Result<RequestDispatcher> {
    let assistant = build_assistant(config)?;
    let workflow = build_workflow(config, &assistant)?;
    let monitor = build_monitor(config)?;
    let dispatcher = RequestDispatcher::new(workflow, assistant, monitor);

    Ok(match marker_classifier(config.routing.alert_markers.as_deref()) {
        Some(classifier) => dispatcher.with_alert_classifier(classifier),
        None => dispatcher,
    })
}

/// A substring classifier over configured markers, if any were configured.
fn marker_classifier(markers: Option<&[String]>) -> Option<Arc<dyn IntentClassifier>> {
    let markers = markers.filter(|m| !m.is_empty())?;
    let classifier = KeywordClassifier::new(markers.iter().cloned(), MatchMode::Substring);
    Some(Arc::new(classifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_markers_replace_builtin_ones() {
        let markers = vec!["page me".to_string()];
        let classifier = marker_classifier(Some(markers.as_slice())).unwrap();
        assert!(classifier.matches("page me if vix goes over 30"));
        assert!(!classifier.matches("alert me if vix goes over 30"));
    }

    #[test]
    fn empty_marker_list_keeps_builtin_classifier() {
        assert!(marker_classifier(Some(&[][..])).is_none());
        assert!(marker_classifier(None).is_none());
    }

    #[test]
    fn missing_credentials_fail_at_construction() {
        let config = AppConfig::default();
        let err = build_assistant(&config).err().unwrap();
        assert!(format!("{err:#}").contains("LLM client"));

        let mut config = AppConfig::default();
        config.llm.api_key = "gsk-test".into();
        let assistant = build_assistant(&config).unwrap();
        let err = build_workflow(&config, &assistant).err().unwrap();
        assert!(format!("{err:#}").contains("supabase url is not set"));

        let err = build_monitor(&config).err().unwrap();
        assert!(format!("{err:#}").contains("notify.smtp_host"));
    }
}
