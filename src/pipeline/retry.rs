//! Retry with exponential backoff for upstream calls.
//!
//! Only failures the [`RetryClassifier`] accepts are retried; everything
//! else, and the last failure once retries run out, escalates as an
//! `Upstream` error. Both the call and the backoff sleep race the run's
//! cancellation token, so a superseded run stops within one poll.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::upstream::UpstreamFailure;
use crate::config::env_parse;
use crate::error::{ClassifiedError, ErrorCode};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Transport messages that mark a failure as transient.
pub const TRANSIENT_MARKERS: [&str; 6] = [
    "ECONNRESET",
    "Connection error",
    "fetch failed",
    "terminated",
    "connection reset",
    "connection closed",
];

// =============================================================================
// CLASSIFIER
// =============================================================================

pub trait RetryClassifier: Send + Sync {
    fn is_retryable(&self, failure: &UpstreamFailure) -> bool;
}

/// Retries transport failures whose message contains a known marker.
#[derive(Debug, Clone, Default)]
pub struct TransientAllowList;

impl RetryClassifier for TransientAllowList {
    fn is_retryable(&self, failure: &UpstreamFailure) -> bool {
        match failure {
            UpstreamFailure::Transport(message) => TRANSIENT_MARKERS.iter().any(|m| message.contains(m)),
            _ => false,
        }
    }
}

/// Fold a failure into the taxonomy: `Transient` when `classifier` accepts
/// it for retry, `Upstream` otherwise.
pub fn classify(classifier: &dyn RetryClassifier, failure: &UpstreamFailure) -> ClassifiedError {
    if classifier.is_retryable(failure) {
        ClassifiedError::transient(failure.to_string())
    } else {
        ClassifiedError::upstream(failure.to_string())
    }
}

// =============================================================================
// POLICY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS) }
    }
}

impl RetryPolicy {
    /// Optional:
    /// - `PIPELINE_MAX_RETRIES`: default 3
    /// - `PIPELINE_INITIAL_DELAY_MS`: default 1000
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_retries: env_parse("PIPELINE_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            initial_delay: Duration::from_millis(env_parse("PIPELINE_INITIAL_DELAY_MS", DEFAULT_INITIAL_DELAY_MS)),
        }
    }

    /// Delay before retry number `attempt + 1`: `initial_delay * 2^attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds, fails for good, or `cancel` fires.
///
/// `op` receives the zero-based attempt number.
///
/// # Errors
///
/// `Cancelled` when the token fires first; otherwise `Upstream` carrying the
/// last failure's message.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    classifier: &dyn RetryClassifier,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ClassifiedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UpstreamFailure>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ClassifiedError::cancelled());
        }
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ClassifiedError::cancelled()),
            outcome = op(attempt) => outcome,
        };

        let failure = match outcome {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let error = classify(classifier, &failure);
        if !error.retryable() || attempt >= policy.max_retries {
            tracing::warn!(attempt, code = failure.error_code(), error = %failure, "upstream call failed");
            return Err(error.escalate());
        }

        let delay = policy.delay(attempt);
        tracing::info!(
            retry = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            code = error.error_code(),
            error = %failure,
            "transient upstream failure, backing off"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ClassifiedError::cancelled()),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
