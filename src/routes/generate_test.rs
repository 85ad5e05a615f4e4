use super::*;
use crate::pipeline::UpstreamFailure;
use crate::state::test_helpers::{QueuedUpstream, test_app_state_with_upstream, test_app_state_without_upstream};

fn fenced(code: &str) -> Result<String, UpstreamFailure> {
    Ok(format!("```jsx\n{code}\n```"))
}

#[tokio::test]
async fn generate_requires_prompt() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": "   " }), json!({ "prompt": 7 })] {
        let err = generate(State(state.clone()), Json(body)).await.unwrap_err();
        assert_eq!(err, ApiError::bad_request("Prompt is required"));
    }
}

#[tokio::test]
async fn generate_returns_fence_stripped_code() {
    let upstream = QueuedUpstream::new([fenced("const Component = () => <p>hi</p>;")]);
    let state = test_app_state_with_upstream(upstream.clone());

    let Json(body) = generate(State(state), Json(json!({ "prompt": "Say hi" }))).await.unwrap();
    assert_eq!(body, json!({ "code": "const Component = () => <p>hi</p>;" }));
    assert_eq!(upstream.seen.lock().clone(), vec![("Say hi".to_owned(), 8192)]);
}

#[tokio::test(start_paused = true)]
async fn generate_retries_transient_failures() {
    let upstream = QueuedUpstream::new([
        Err(UpstreamFailure::Transport("fetch failed".into())),
        fenced("const Component = () => null;"),
    ]);
    let state = test_app_state_with_upstream(upstream.clone());

    let Json(body) = generate(State(state), Json(json!({ "prompt": "p" }))).await.unwrap();
    assert_eq!(body["code"], "const Component = () => null;");
    assert_eq!(upstream.seen.lock().len(), 2);
}

#[tokio::test]
async fn generate_reports_upstream_failure() {
    let upstream = QueuedUpstream::new([Err(UpstreamFailure::Status { status: 401, message: "invalid x-api-key".into() })]);
    let state = test_app_state_with_upstream(upstream.clone());

    let err = generate(State(state), Json(json!({ "prompt": "p" }))).await.unwrap_err();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message, "Failed to generate component: invalid x-api-key");
    assert_eq!(err.code, "E_UPSTREAM");
    assert_eq!(upstream.seen.lock().len(), 1);
}

#[tokio::test]
async fn generate_without_llm_is_server_error() {
    let state = test_app_state_without_upstream();
    let err = generate(State(state), Json(json!({ "prompt": "p" }))).await.unwrap_err();
    assert_eq!(err.message, "Failed to generate component: LLM not configured");
}

#[tokio::test]
async fn visualize_requires_component_code() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    let err = visualize(State(state), Json(json!({ "prompt": "wrong field" }))).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("Component code is required"));
}

#[tokio::test]
async fn visualize_wraps_component_code() {
    let upstream = QueuedUpstream::new([fenced("const Component = () => <svg />;")]);
    let state = test_app_state_with_upstream(upstream.clone());

    let Json(body) = visualize(State(state), Json(json!({ "componentCode": "const Component = () => null;" })))
        .await
        .unwrap();
    assert_eq!(body["code"], "const Component = () => <svg />;");

    let seen = upstream.seen.lock().clone();
    assert_eq!(
        seen[0].0,
        "Create a visual, interactive explanation of this component:\n\nconst Component = () => null;"
    );
    assert_eq!(seen[0].1, 4096);
}

#[tokio::test]
async fn visualize_reports_upstream_failure() {
    let upstream = QueuedUpstream::new([Err(UpstreamFailure::Malformed("No text response from model".into()))]);
    let state = test_app_state_with_upstream(upstream);

    let err = visualize(State(state), Json(json!({ "componentCode": "x" }))).await.unwrap_err();
    assert_eq!(err.message, "Failed to generate visualization: No text response from model");
}
