//! Single-stage generation routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{ApiError, required_str};
use crate::error::{ClassifiedError, ErrorCode};
use crate::pipeline::retry::{TransientAllowList, with_retry};
use crate::pipeline::sanitize::strip_fences;
use crate::pipeline::{UpstreamRequest, visualization_request};
use crate::state::AppState;

/// `POST /api/generate` — `{prompt}` → `{code}` for the component stage.
pub async fn generate(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let Some(prompt) = required_str(&body, "prompt") else {
        return Err(ApiError::bad_request("Prompt is required"));
    };

    let max_output_tokens = state.config.pipeline.component_max_tokens;
    complete(&state, &state.prompts.component, prompt, max_output_tokens)
        .await
        .map(|code| Json(json!({ "code": code })))
        .map_err(|err| stage_error("Failed to generate component", &err))
}

/// `POST /api/visualize` — `{componentCode}` → `{code}` for the visualization stage.
pub async fn visualize(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let Some(component_code) = required_str(&body, "componentCode") else {
        return Err(ApiError::bad_request("Component code is required"));
    };

    let request = visualization_request(component_code);
    let max_output_tokens = state.config.pipeline.visualization_max_tokens;
    complete(&state, &state.prompts.visualization, &request, max_output_tokens)
        .await
        .map(|code| Json(json!({ "code": code })))
        .map_err(|err| stage_error("Failed to generate visualization", &err))
}

async fn complete(
    state: &AppState,
    system_prompt: &str,
    user_content: &str,
    max_output_tokens: u32,
) -> Result<String, ClassifiedError> {
    let upstream = state.upstream().map_err(|e| ClassifiedError::upstream(e.to_string()))?;
    // Stateless requests are never superseded; the token only exists for the signature.
    let cancel = CancellationToken::new();
    let raw = with_retry(&state.config.pipeline.retry, &TransientAllowList, &cancel, |_| {
        upstream.complete(UpstreamRequest { system_prompt, user_content, max_output_tokens })
    })
    .await?;
    Ok(strip_fences(&raw))
}

fn stage_error(prefix: &str, err: &ClassifiedError) -> ApiError {
    tracing::warn!(code = err.error_code(), error = %err, "{prefix}");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{prefix}: {err}")).with_code(err.error_code())
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
