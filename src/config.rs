//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Each subsystem owns its knobs and reads them in its own `from_env`
//! (`PipelineConfig`, `SandboxConfig`, `SystemPrompts`, `LlmConfig`).
//! Tuning knobs fall back to their defaults when absent or unparsable; only
//! values the process cannot run without (the listen port, prompt files that
//! were named but cannot be read) are hard errors.
//!
//! `main` loads `.env` via `dotenvy` before anything here runs, so values in
//! the file behave exactly like exported variables.

use std::str::FromStr;

use crate::error::ErrorCode;
use crate::pipeline::PipelineConfig;
use crate::prompts::SystemPrompts;
use crate::sandbox::SandboxConfig;
use crate::state::SessionConfig;

pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value is present but malformed.
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    /// A prompt override file was named but could not be read.
    #[error("failed to read {var} ({path}): {source}")]
    PromptFile {
        var: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "E_CONFIG_INVALID",
            Self::PromptFile { .. } => "E_CONFIG_PROMPT_FILE",
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub pipeline: PipelineConfig,
    pub sandbox: SandboxConfig,
    pub sessions: SessionConfig,
    pub prompts: SystemPrompts,
}

impl AppConfig {
    /// Build the full application config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `PIPELINE_*`: see [`PipelineConfig::from_env`]
    /// - `SANDBOX_*`: see [`SandboxConfig::from_env`]
    /// - `SESSION_*`: see [`SessionConfig::from_env`]
    /// - `PROMPT_*_FILE`: see [`SystemPrompts::from_env`]
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port number or a named
    /// prompt file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            pipeline: PipelineConfig::from_env(),
            sandbox: SandboxConfig::from_env(),
            sessions: SessionConfig::from_env(),
            prompts: SystemPrompts::from_env()?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            pipeline: PipelineConfig::default(),
            sandbox: SandboxConfig::default(),
            sessions: SessionConfig::default(),
            prompts: SystemPrompts::default(),
        }
    }
}

/// Read `key` and parse it, falling back to `default` when the variable is
/// unset or does not parse.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
