//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the upstream (absent when no API key is configured), one sandbox
//! compiler shared by every session so generation keys are process-wide,
//! and the live sessions, each with its own [`Pipeline`].
//!
//! Sessions live in memory only. Every lookup marks a session as used, and
//! [`spawn_session_sweeper`] drops sessions idle for longer than
//! [`SessionConfig::idle_ttl`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::{AppConfig, env_parse};
use crate::pipeline::{Pipeline, Upstream, UpstreamFailure};
use crate::prompts::SystemPrompts;
use crate::sandbox::SandboxCompiler;

pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub idle_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_INTERVAL_SECS),
        }
    }
}

impl SessionConfig {
    /// Optional:
    /// - `SESSION_IDLE_TTL_SECS`: default 3600
    /// - `SESSION_SWEEP_INTERVAL_SECS`: default 60, clamped to at least 1
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            idle_ttl: Duration::from_secs(env_parse("SESSION_IDLE_TTL_SECS", DEFAULT_SESSION_IDLE_TTL_SECS)),
            sweep_interval: Duration::from_secs(
                env_parse("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SESSION_SWEEP_INTERVAL_SECS).max(1),
            ),
        }
    }
}

/// A live session and when a request last reached it.
pub struct Session {
    pub pipeline: Arc<Pipeline>,
    last_used: Mutex<Instant>,
}

impl Session {
    fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline, last_used: Mutex::new(Instant::now()) }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_used.lock())
    }
}

/// Shared application state. Clone is required by Axum; every field is an
/// `Arc` or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub upstream: Option<Arc<dyn Upstream>>,
    pub compiler: Arc<SandboxCompiler>,
    pub prompts: Arc<SystemPrompts>,
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, upstream: Option<Arc<dyn Upstream>>) -> Self {
        Self {
            compiler: Arc::new(SandboxCompiler::new(config.sandbox)),
            prompts: Arc::new(config.prompts.clone()),
            config: Arc::new(config),
            upstream,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The configured upstream.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when the process started without LLM credentials.
    pub fn upstream(&self) -> Result<Arc<dyn Upstream>, UpstreamFailure> {
        self.upstream.clone().ok_or(UpstreamFailure::NotConfigured)
    }

    /// Create a session with a fresh pipeline.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when there is no upstream to drive it.
    pub async fn create_session(&self) -> Result<(Uuid, Arc<Pipeline>), UpstreamFailure> {
        let pipeline = Arc::new(Pipeline::new(
            self.upstream()?,
            self.compiler.clone(),
            self.config.pipeline,
            self.prompts.clone(),
        ));
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(pipeline.clone()));
        tracing::info!(session = %id, "session created");
        Ok((id, pipeline))
    }

    /// Look up a session and mark it used.
    pub async fn session(&self, id: Uuid) -> Option<Arc<Pipeline>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&id)?;
        session.touch();
        Some(session.pipeline.clone())
    }

    /// Drop sessions unused for at least `ttl`, closing their pipelines.
    /// Returns how many were dropped.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.sessions.write().await.retain(|id, session| {
            let keep = session.idle_for(now) < ttl;
            if !keep {
                evicted.push((*id, session.pipeline.clone()));
            }
            keep
        });
        for (id, pipeline) in &evicted {
            pipeline.close();
            tracing::info!(session = %id, "idle session evicted");
        }
        evicted.len()
    }
}

/// Spawn the task that evicts idle sessions every
/// [`SessionConfig::sweep_interval`].
pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    let config = state.config.sessions;
    tracing::info!(
        idle_ttl_secs = config.idle_ttl.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "session sweeper configured"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = state.sweep_idle(config.idle_ttl).await;
            if evicted > 0 {
                let remaining = state.sessions.read().await.len();
                tracing::debug!(evicted, remaining, "session sweep complete");
            }
        }
    })
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
