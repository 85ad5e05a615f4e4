//! Session routes.
//!
//! DESIGN
//! ======
//! A session is one server-side [`Pipeline`](crate::pipeline::Pipeline).
//! Submitting a prompt spawns the run and returns immediately; clients poll
//! `GET /api/sessions/{id}` for the view. Events for either display slot are
//! dispatched synchronously and answer with the slot's new view. Timers in a
//! slot only run when the client ticks it with the elapsed time.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ApiError, required_str};
use crate::pipeline::{PipelineView, SlotId, UpstreamFailure};
use crate::prompts::{PRESET_PROMPTS, PresetPrompt};
use crate::sandbox::boundary::{SlotEventError, SlotView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub handler: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickBody {
    pub elapsed_ms: f64,
}

/// `GET /api/presets` — the quick-start prompts.
pub async fn presets() -> Json<Vec<PresetPrompt>> {
    Json(PRESET_PROMPTS.to_vec())
}

/// `POST /api/sessions` — create a session.
pub async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (id, pipeline) = state.create_session().await.map_err(|err| match err {
        UpstreamFailure::NotConfigured => ApiError::from_error(StatusCode::SERVICE_UNAVAILABLE, &err),
        other => ApiError::from_error(StatusCode::INTERNAL_SERVER_ERROR, &other),
    })?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "view": pipeline.view() }))))
}

/// `GET /api/sessions/{id}` — current pipeline view.
pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PipelineView>, ApiError> {
    let pipeline = state.session(id).await.ok_or_else(|| session_not_found(id))?;
    Ok(Json(pipeline.view()))
}

/// `POST /api/sessions/{id}/prompt` — start a run, superseding any in flight.
pub async fn submit_prompt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let Some(prompt) = required_str(&body, "prompt") else {
        return Err(ApiError::bad_request("Prompt is required"));
    };
    let pipeline = state.session(id).await.ok_or_else(|| session_not_found(id))?;

    let prompt = prompt.to_owned();
    tokio::spawn(async move {
        // Failures are already recorded in the session view.
        let _ = pipeline.run(&prompt).await;
    });
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/sessions/{id}/slots/{slot}/events` — deliver a UI event.
pub async fn dispatch_event(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
    Json(body): Json<EventBody>,
) -> Result<Json<SlotView>, ApiError> {
    let slot: SlotId = slot.parse().map_err(ApiError::bad_request)?;
    let pipeline = state.session(id).await.ok_or_else(|| session_not_found(id))?;

    pipeline
        .dispatch(slot, &body.handler, &body.payload)
        .map(Json)
        .map_err(event_error_to_api)
}

/// `POST /api/sessions/{id}/slots/{slot}/tick` — advance the slot's timers
/// by `elapsedMs`.
pub async fn tick(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
    Json(body): Json<TickBody>,
) -> Result<Json<SlotView>, ApiError> {
    let slot: SlotId = slot.parse().map_err(ApiError::bad_request)?;
    if !body.elapsed_ms.is_finite() || body.elapsed_ms < 0.0 {
        return Err(ApiError::bad_request("elapsedMs must be a non-negative number"));
    }
    let pipeline = state.session(id).await.ok_or_else(|| session_not_found(id))?;

    pipeline.advance(slot, body.elapsed_ms).map(Json).map_err(event_error_to_api)
}

fn session_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("session {id} not found"))
}

fn event_error_to_api(err: SlotEventError) -> ApiError {
    let status = match err {
        SlotEventError::NotDisplaying => StatusCode::CONFLICT,
        SlotEventError::UnknownHandler(_) => StatusCode::NOT_FOUND,
        SlotEventError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::from_error(status, &err)
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
