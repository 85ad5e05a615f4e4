use super::*;
use crate::error::ClassifiedError;

async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn error_body_carries_message_and_code() {
    let (status, body) = body_json(ApiError::not_found("session x not found")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "error": "session x not found", "code": "E_NOT_FOUND" }));
}

#[tokio::test]
async fn from_error_uses_the_error_code() {
    let err = ApiError::from_error(StatusCode::INTERNAL_SERVER_ERROR, &ClassifiedError::runtime("boom"));
    let (_, body) = body_json(err).await;
    assert_eq!(body["code"], "E_RUNTIME");
    assert_eq!(body["error"], "boom");
}

#[test]
fn required_str_treats_blank_and_non_strings_as_missing() {
    let body = serde_json::json!({ "a": "  ", "b": 3, "c": "ok" });
    assert_eq!(required_str(&body, "a"), None);
    assert_eq!(required_str(&body, "b"), None);
    assert_eq!(required_str(&body, "c"), Some("ok"));
}
