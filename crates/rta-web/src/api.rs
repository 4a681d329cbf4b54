//! REST API route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use rta_intent::{AskRequest, AskResponse, IntentError, MonitorInfo};

use crate::state::AppState;

/// Body returned for every failure that is not the caller's fault.
pub const SERVICE_FAILED: &str = "Agent service failed.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed request, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<IntentError> for ApiError {
    fn from(e: IntentError) -> Self {
        match e {
            IntentError::InvalidCondition { .. } => Self::bad_request(e.to_string()),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: SERVICE_FAILED.to_owned(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// POST /ask
// ---------------------------------------------------------------------------

/// Answer a question or set up a monitor for it.
///
/// A malformed body or an unknown source is rejected with `400` before the
/// dispatcher runs.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload?;
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let response = state
        .dispatcher
        .handle(&request.question, request.source)
        .await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub active_monitors: usize,
}

/// Return basic service status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_monitors: state.dispatcher.active_sessions().await,
    })
}

// ---------------------------------------------------------------------------
// GET /api/monitors
// ---------------------------------------------------------------------------

/// List the running monitor sessions.
pub async fn monitors(State(state): State<Arc<AppState>>) -> Json<Vec<MonitorInfo>> {
    Json(state.dispatcher.sessions().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_condition_is_bad_request() {
        let err = ApiError::from(IntentError::InvalidCondition {
            reason: "unknown field `smoke`".into(),
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.detail.contains("smoke"));
    }

    #[test]
    fn other_failures_are_generic() {
        let err = ApiError::from(IntentError::StageFailed {
            stage: "fallback".into(),
            reason: "model unavailable".into(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail, SERVICE_FAILED);
    }
}
