use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::time::Instant;

use super::*;
use crate::error::ErrorKind;

fn reset() -> UpstreamFailure {
    UpstreamFailure::Transport("read ECONNRESET".into())
}

/// Fails with `failure` for the first `failures` attempts, then succeeds.
fn flaky(failures: u32, failure: UpstreamFailure) -> (Arc<AtomicU32>, impl FnMut(u32) -> std::future::Ready<Result<&'static str, UpstreamFailure>>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let op = move |attempt: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(if attempt < failures { Err(failure.clone()) } else { Ok("code") })
    };
    (calls, op)
}

#[test]
fn allow_list_matches_transport_markers_only() {
    let classifier = TransientAllowList;
    assert!(classifier.is_retryable(&reset()));
    assert!(classifier.is_retryable(&UpstreamFailure::Transport("TypeError: fetch failed".into())));
    assert!(classifier.is_retryable(&UpstreamFailure::Transport(
        "error sending request: connection closed before message completed".into()
    )));
    assert!(!classifier.is_retryable(&UpstreamFailure::Transport("certificate expired".into())));
    assert!(!classifier.is_retryable(&UpstreamFailure::Status { status: 500, message: "Connection error".into() }));
}

#[test]
fn delay_doubles_per_attempt() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay(0), Duration::from_millis(1000));
    assert_eq!(policy.delay(1), Duration::from_millis(2000));
    assert_eq!(policy.delay(2), Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_second_attempt_after_one_backoff() {
    let (calls, op) = flaky(1, reset());
    let start = Instant::now();

    let out = with_retry(&RetryPolicy::default(), &TransientAllowList, &CancellationToken::new(), op).await;

    assert_eq!(out.unwrap(), "code");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_escalate_as_upstream() {
    let (calls, op) = flaky(u32::MAX, reset());
    let start = Instant::now();

    let err = with_retry(&RetryPolicy::default(), &TransientAllowList, &CancellationToken::new(), op)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Upstream);
    assert_eq!(err.message, "read ECONNRESET");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(start.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
}

#[tokio::test(start_paused = true)]
async fn non_transient_failure_is_not_retried() {
    let failure = UpstreamFailure::Status { status: 401, message: "invalid x-api-key".into() };
    let (calls, op) = flaky(u32::MAX, failure);
    let start = Instant::now();

    let err = with_retry(&RetryPolicy::default(), &TransientAllowList, &CancellationToken::new(), op)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Upstream);
    assert_eq!(err.message, "invalid x-api-key");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_one_attempt() {
    let policy = RetryPolicy { max_retries: 0, initial_delay: Duration::from_millis(10) };
    let (calls, op) = flaky(u32::MAX, reset());

    let err = with_retry(&policy, &TransientAllowList, &CancellationToken::new(), op).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Upstream);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let (calls, op) = flaky(u32::MAX, reset());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });
    let start = Instant::now();

    let err = with_retry(&RetryPolicy::default(), &TransientAllowList, &cancel, op).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test]
async fn cancelled_token_skips_the_call() {
    let (calls, op) = flaky(0, reset());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = with_retry(&RetryPolicy::default(), &TransientAllowList, &cancel, op).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn classify_marks_retryable_failures_transient() {
    let transient = classify(&TransientAllowList, &reset());
    assert_eq!(transient.kind, ErrorKind::Transient);
    assert!(transient.retryable());
    assert_eq!(transient.error_code(), "E_TRANSIENT");

    let fatal = classify(&TransientAllowList, &UpstreamFailure::Status { status: 400, message: "bad".into() });
    assert_eq!(fatal.kind, ErrorKind::Upstream);
    assert!(!fatal.retryable());
}
