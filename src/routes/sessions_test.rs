use super::*;
use crate::pipeline::Stage;
use crate::sandbox::boundary::SlotState;
use crate::state::test_helpers::{QueuedUpstream, test_app_state_with_upstream, test_app_state_without_upstream};

const COUNTER: &str = "const Component = () => {\n  const [n, setN] = useState(0);\n  return <button onClick={() => setN(n + 1)}>{n}</button>;\n};";
const VISUAL: &str = "const Component = () => <p>count</p>;";
const CLOCK: &str = "const Component = () => {\n  const [s, setS] = useState(0);\n  useEffect(() => {\n    const id = setInterval(() => setS(x => x + 1), 1000);\n    return () => clearInterval(id);\n  }, []);\n  return <p>{s}</p>;\n};";

fn fenced(code: &str) -> Result<String, UpstreamFailure> {
    Ok(format!("```jsx\n{code}\n```"))
}

async fn settled(state: &AppState, id: Uuid) -> PipelineView {
    loop {
        let Json(view) = get_session(State(state.clone()), Path(id)).await.unwrap();
        if !view.is_generating && !view.is_visualizing && view.stage != Stage::Idle {
            return view;
        }
        tokio::task::yield_now().await;
    }
}

async fn new_session(state: &AppState) -> Uuid {
    let (status, Json(body)) = create_session(State(state.clone())).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn presets_lists_all_quick_starts() {
    let Json(presets) = presets().await;
    assert_eq!(presets.len(), 6);
    assert_eq!(presets[0].label, "Pomodoro Timer");
}

#[tokio::test]
async fn create_session_returns_empty_view() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    let (_, Json(body)) = create_session(State(state.clone())).await.unwrap();

    assert_eq!(body["view"]["stage"], "idle");
    assert_eq!(body["view"]["turns"], json!([]));
    assert_eq!(state.sessions.read().await.len(), 1);
}

#[tokio::test]
async fn create_session_without_llm_is_unavailable() {
    let state = test_app_state_without_upstream();
    let err = create_session(State(state)).await.unwrap_err();
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.code, "E_LLM_NOT_CONFIGURED");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    let err = get_session(State(state.clone()), Path(Uuid::nil())).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);

    let err = submit_prompt(State(state), Path(Uuid::nil()), Json(json!({ "prompt": "p" })))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_lookup() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    let err = submit_prompt(State(state), Path(Uuid::nil()), Json(json!({ "prompt": "" })))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::bad_request("Prompt is required"));
}

#[tokio::test]
async fn submitted_prompt_runs_in_background() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([fenced(COUNTER), fenced(VISUAL)]));
    let id = new_session(&state).await;

    let status = submit_prompt(State(state.clone()), Path(id), Json(json!({ "prompt": "Build a counter" })))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    let view = settled(&state, id).await;
    assert_eq!(view.stage, Stage::SecondaryReady);
    assert_eq!(view.primary_code.as_deref(), Some(COUNTER));
    assert_eq!(view.secondary.html.as_deref(), Some("<p>count</p>"));
}

#[tokio::test]
async fn events_update_the_slot() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([fenced(COUNTER), fenced(VISUAL)]));
    let id = new_session(&state).await;
    submit_prompt(State(state.clone()), Path(id), Json(json!({ "prompt": "p" })))
        .await
        .unwrap();
    settled(&state, id).await;

    let body = EventBody { handler: "h0".into(), payload: Value::Null };
    let Json(slot) = dispatch_event(State(state.clone()), Path((id, "primary".into())), Json(body))
        .await
        .unwrap();
    assert_eq!(slot.state, SlotState::Displaying);
    assert_eq!(slot.html.as_deref(), Some(r#"<button data-on-click="h0">1</button>"#));
}

#[tokio::test]
async fn event_errors_map_to_statuses() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([fenced(COUNTER), fenced(VISUAL)]));
    let id = new_session(&state).await;

    let body = || EventBody { handler: "h0".into(), payload: Value::Null };
    let err = dispatch_event(State(state.clone()), Path((id, "primary".into())), Json(body()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(err.code, "E_SLOT_NOT_DISPLAYING");

    let err = dispatch_event(State(state.clone()), Path((id, "tertiary".into())), Json(body()))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::bad_request("unknown slot: tertiary"));

    submit_prompt(State(state.clone()), Path(id), Json(json!({ "prompt": "p" })))
        .await
        .unwrap();
    settled(&state, id).await;
    let err = dispatch_event(State(state.clone()), Path((id, "secondary".into())), Json(body()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[test]
fn event_body_payload_defaults_to_null() {
    let body: EventBody = serde_json::from_str(r#"{"handler":"h3"}"#).unwrap();
    assert_eq!(body.handler, "h3");
    assert!(body.payload.is_null());
}

#[tokio::test]
async fn tick_runs_slot_timers() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([fenced(CLOCK), fenced(VISUAL)]));
    let id = new_session(&state).await;
    submit_prompt(State(state.clone()), Path(id), Json(json!({ "prompt": "p" })))
        .await
        .unwrap();
    let view = settled(&state, id).await;
    assert_eq!(view.primary.pending_timers, 1);

    let body = |ms| Json(TickBody { elapsed_ms: ms });
    let Json(slot) = tick(State(state.clone()), Path((id, "primary".into())), body(3000.0))
        .await
        .unwrap();
    assert_eq!(slot.html.as_deref(), Some("<p>3</p>"));
    assert_eq!(slot.pending_timers, 1);

    let Json(slot) = tick(State(state.clone()), Path((id, "secondary".into())), body(3000.0))
        .await
        .unwrap();
    assert_eq!(slot.html.as_deref(), Some("<p>count</p>"));

    let err = tick(State(state.clone()), Path((id, "primary".into())), body(-1.0))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::bad_request("elapsedMs must be a non-negative number"));
}

#[test]
fn tick_body_is_camel_case() {
    let body: TickBody = serde_json::from_str(r#"{"elapsedMs":16}"#).unwrap();
    assert!((body.elapsed_ms - 16.0).abs() < f64::EPSILON);
}
