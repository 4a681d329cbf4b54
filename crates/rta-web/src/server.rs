//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and serves
//! until the shutdown signal resolves.  Running monitor sessions are stopped
//! and joined before `start` returns.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use rta_intent::RequestDispatcher;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The RTA HTTP service.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: WebConfig, dispatcher: Arc<RequestDispatcher>) -> Self {
        let state = Arc::new(AppState::new(dispatcher, config.clone()));
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        Router::new()
            .route("/ask", post(api::ask))
            .route("/api/status", get(api::status))
            .route("/api/monitors", get(api::monitors))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Serve until `shutdown` resolves, then stop every monitor session.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("web server stopped, stopping monitor sessions");
        self.state.dispatcher.stop_all().await;
        Ok(())
    }
}
