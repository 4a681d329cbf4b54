//! Request routing and condition-based stream monitoring for RTA.
//!
//! This crate provides:
//!
//! - **Conditions**: a structured comparison tree parsed from translator
//!   output and evaluated against normalized telemetry records via
//!   [`condition::Condition`].
//! - **Query workflow**: the greeting / query / summarize / fallback
//!   state machine via [`workflow::QueryWorkflow`].
//! - **Stream monitor**: background sessions that notify on every matching
//!   record via [`monitor::StreamMonitor`].
//! - **Dispatcher**: the request boundary that chooses between the two via
//!   [`dispatcher::RequestDispatcher`].

pub mod condition;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod workflow;

pub use condition::{CompareOp, Condition, Evaluation, Literal, TelemetryRecord, evaluate_text};
pub use dispatcher::{AskRequest, AskResponse, RequestDispatcher};
pub use error::{IntentError, Result};
pub use monitor::{MonitorHandle, MonitorInfo, MonitorReport, SessionEnd, StreamMonitor};
pub use workflow::{QueryWorkflow, Stage, WorkflowOutcome, WorkflowServices, WorkflowState};
