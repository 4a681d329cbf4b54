//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.

use std::sync::Arc;
use std::time::Instant;

use rta_intent::RequestDispatcher;

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
pub struct AppState {
    /// Routes requests to the workflow or to a new monitor session.
    pub dispatcher: Arc<RequestDispatcher>,

    /// Web server configuration.
    pub config: WebConfig,

    /// When the state was built, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<RequestDispatcher>, config: WebConfig) -> Self {
        Self {
            dispatcher,
            config,
            started_at: Instant::now(),
        }
    }
}
