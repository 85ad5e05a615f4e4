//! Pipeline error taxonomy.
//!
//! Every subsystem error (`LlmError`, `UpstreamFailure`, `ParseError`,
//! thrown sandbox values) is folded into one [`ClassifiedError`] at the
//! pipeline boundary. The kind decides where the error surfaces: a chat
//! turn, an inline slot message, or nowhere at all.

use std::fmt;

use serde::Serialize;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for logs and error payloads.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CLASSIFIED ERROR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport failure on the retry allow-list.
    Transient,
    /// Non-success upstream response, or a transient failure out of retries.
    Upstream,
    /// Generated source could not be parsed or lowered.
    Transform,
    /// Generated program threw at top level or did not define `Component`.
    Execution,
    /// Thrown while rendering, in an effect, or in an event handler.
    Runtime,
    /// Superseded by a newer submission. Never shown.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transform, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "superseded by a newer request")
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// A `Transient` error that will not be retried again becomes `Upstream`.
    #[must_use]
    pub fn escalate(self) -> Self {
        match self.kind {
            ErrorKind::Transient => Self { kind: ErrorKind::Upstream, ..self },
            _ => self,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Transform => write!(f, "Transform error: {}", self.message),
            ErrorKind::Execution => write!(f, "Execution error: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {}

impl ErrorCode for ClassifiedError {
    fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Transient => "E_TRANSIENT",
            ErrorKind::Upstream => "E_UPSTREAM",
            ErrorKind::Transform => "E_TRANSFORM",
            ErrorKind::Execution => "E_EXECUTION",
            ErrorKind::Runtime => "E_RUNTIME",
            ErrorKind::Cancelled => "E_CANCELLED",
        }
    }

    fn retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
