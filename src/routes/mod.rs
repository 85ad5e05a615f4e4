//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Two API families share one Axum router. The stateless pair
//! (`/api/generate`, `/api/visualize`) returns a single stage's raw code for
//! clients that run their own pipeline. The session endpoints run the full
//! pipeline server-side and expose its view, including rendered output and
//! event dispatch for both display slots.

pub mod generate;
pub mod sessions;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ErrorCode;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/generate", post(generate::generate))
        .route("/api/visualize", post(generate::visualize))
        .route("/api/presets", get(sessions::presets))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/{id}", get(sessions::get_session))
        .route("/api/sessions/{id}/prompt", post(sessions::submit_prompt))
        .route("/api/sessions/{id}/slots/{slot}/events", post(sessions::dispatch_event))
        .route("/api/sessions/{id}/slots/{slot}/tick", post(sessions::tick))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error response: `{"error": "...", "code": "E_..."}` with a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    /// Error with the generic code for `status`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let code = match status {
            StatusCode::BAD_REQUEST => "E_BAD_REQUEST",
            StatusCode::NOT_FOUND => "E_NOT_FOUND",
            StatusCode::CONFLICT => "E_CONFLICT",
            StatusCode::SERVICE_UNAVAILABLE => "E_UNAVAILABLE",
            _ => "E_INTERNAL",
        };
        Self { status, code, message: message.into() }
    }

    /// Error carrying `err`'s own code and display text.
    pub fn from_error(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self { status, code: err.error_code(), message: err.to_string() }
    }

    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message, "code": self.code }))).into_response()
    }
}

/// Non-empty string field of a JSON body. Wrong types count as missing.
pub(crate) fn required_str<'a>(body: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
