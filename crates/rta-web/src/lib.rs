//! HTTP service for RTA.
//!
//! This crate exposes the request dispatcher over HTTP:
//!
//! - `POST /ask` answers a question or sets up a monitor.
//! - `GET /api/status` reports service status and active monitors.
//! - `GET /api/monitors` lists the running monitor sessions.

pub mod api;
pub mod server;
pub mod state;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8001,
        }
    }
}
