//! Generation-to-render pipeline.
//!
//! DESIGN
//! ======
//! One [`Pipeline`] per session. A submission drives two upstream calls in
//! sequence, each followed by sanitize, compile and display:
//!
//! ```text
//! prompt ─► upstream (component) ─► clean ─► compile ─► primary slot
//!                                                           │
//!        upstream (visualization of cleaned primary) ◄──────┘
//!             └─► clean ─► compile ─► secondary slot
//! ```
//!
//! The leaves (`sanitize`, `retry`, `upstream`) are independent; `state`
//! holds what the presentation reads; `orchestrator` owns sequencing,
//! cancellation and error routing.

pub mod orchestrator;
pub mod retry;
pub mod sanitize;
pub mod state;
pub mod upstream;

pub use orchestrator::Pipeline;
pub use retry::{RetryClassifier, RetryPolicy, TransientAllowList};
pub use state::{PipelineState, PipelineView, SlotId, Stage};
pub use upstream::{Upstream, UpstreamFailure, UpstreamRequest};

use crate::config::env_parse;

pub const DEFAULT_COMPONENT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_VISUALIZATION_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub component_max_tokens: u32,
    pub visualization_max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            component_max_tokens: DEFAULT_COMPONENT_MAX_TOKENS,
            visualization_max_tokens: DEFAULT_VISUALIZATION_MAX_TOKENS,
        }
    }
}

impl PipelineConfig {
    /// Optional:
    /// - `PIPELINE_MAX_RETRIES`, `PIPELINE_INITIAL_DELAY_MS`: see [`RetryPolicy::from_env`]
    /// - `PIPELINE_COMPONENT_MAX_TOKENS`: default 8192
    /// - `PIPELINE_VISUALIZATION_MAX_TOKENS`: default 4096
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            retry: RetryPolicy::from_env(),
            component_max_tokens: env_parse("PIPELINE_COMPONENT_MAX_TOKENS", DEFAULT_COMPONENT_MAX_TOKENS),
            visualization_max_tokens: env_parse("PIPELINE_VISUALIZATION_MAX_TOKENS", DEFAULT_VISUALIZATION_MAX_TOKENS),
        }
    }
}

/// User content for the second call: the cleaned primary artifact with a
/// fixed framing line.
#[must_use]
pub fn visualization_request(component_code: &str) -> String {
    format!("Create a visual, interactive explanation of this component:\n\n{component_code}")
}
