//! Upstream text-generation endpoint.
//!
//! The pipeline sees the model through [`Upstream`]: one request in, the
//! generated text or an [`UpstreamFailure`] out. [`LlmUpstream`] adapts the
//! Anthropic client; tests substitute scripted implementations.

use std::sync::Arc;

use crate::error::ErrorCode;
use crate::llm::LlmChat;
use crate::llm::anthropic;
use crate::llm::types::{LlmError, Message};

pub const NO_TEXT_RESPONSE: &str = "No text response from model";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamRequest<'a> {
    pub system_prompt: &'a str,
    pub user_content: &'a str,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamFailure {
    /// The request never produced a response (reset, refused, timed out).
    #[error("{0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The endpoint answered 200 but the body carried no usable text.
    #[error("{0}")]
    Malformed(String),

    /// No upstream is configured for this process.
    #[error("LLM not configured")]
    NotConfigured,
}

impl ErrorCode for UpstreamFailure {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_UPSTREAM_TRANSPORT",
            Self::Status { .. } => "E_UPSTREAM_STATUS",
            Self::Malformed(_) => "E_UPSTREAM_MALFORMED",
            Self::NotConfigured => "E_LLM_NOT_CONFIGURED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Generate text for one request.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamFailure`] describing why no text was produced.
    async fn complete(&self, request: UpstreamRequest<'_>) -> Result<String, UpstreamFailure>;
}

// =============================================================================
// LLM ADAPTER
// =============================================================================

pub struct LlmUpstream {
    llm: Arc<dyn LlmChat>,
}

impl LlmUpstream {
    pub fn new(llm: Arc<dyn LlmChat>) -> Self {
        Self { llm }
    }
}

#[async_trait::async_trait]
impl Upstream for LlmUpstream {
    async fn complete(&self, request: UpstreamRequest<'_>) -> Result<String, UpstreamFailure> {
        let messages = [Message::user(request.user_content)];
        let response = self
            .llm
            .chat(request.max_output_tokens, request.system_prompt, &messages)
            .await
            .map_err(failure_from_llm)?;
        tracing::debug!(
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            stop_reason = %response.stop_reason,
            "upstream completion"
        );
        response
            .text()
            .map(str::to_owned)
            .ok_or_else(|| UpstreamFailure::Malformed(NO_TEXT_RESPONSE.into()))
    }
}

/// Map a client error onto the upstream taxonomy, preferring the message the
/// server supplied over the client's own wording.
pub(crate) fn failure_from_llm(err: LlmError) -> UpstreamFailure {
    match err {
        LlmError::ApiRequest(message) => UpstreamFailure::Transport(message),
        LlmError::ApiResponse { status, body } => {
            let message = anthropic::error_message(&body)
                .or_else(|| Some(body.trim().to_owned()).filter(|b| !b.is_empty()))
                .unwrap_or_else(|| format!("upstream returned status {status}"));
            UpstreamFailure::Status { status, message }
        }
        LlmError::ApiParse(message) => UpstreamFailure::Malformed(message),
        other @ (LlmError::ConfigParse(_) | LlmError::MissingApiKey { .. } | LlmError::HttpClientBuild(_)) => {
            UpstreamFailure::Malformed(other.to_string())
        }
    }
}

#[cfg(test)]
#[path = "upstream_test.rs"]
mod tests;
