//! Configuration for Conductor
//!
//! Loaded from a JSON file (default `~/.conductor/config.json`) with
//! `CONDUCTOR_*` environment variable overrides on top. Every field has a
//! working default, so a missing file is not an error; an invalid file is.
//! Config is passed by value to the components that need it — there is no
//! global config singleton.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConductorError, Result};
use crate::model::RetryPolicy;
use crate::tools::TaskPolicy;

/// Model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible endpoint
    pub api_base: String,
    /// API key (usually supplied via `CONDUCTOR_API_KEY`)
    #[serde(default)]
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Loop bounds for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum routing decisions per user turn
    pub max_routing_decisions: u32,
    /// Maximum rounds per worker run
    pub max_worker_rounds: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_routing_decisions: 8,
            max_worker_rounds: 6,
        }
    }
}

/// Backoff settings for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempt budget, including the first call
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model backend settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Loop bounds
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Task update policy
    #[serde(default)]
    pub tasks: TaskPolicy,
    /// Directory for session files (default `~/.conductor/sessions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,
    /// Directory for profile files (default `~/.conductor/profiles`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
}

impl Config {
    /// The default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".conductor").join("config.json"))
    }

    /// Load config: file (if it exists), then environment overrides, then
    /// validation.
    ///
    /// # Errors
    /// An unreadable or invalid file, or a validation failure.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(Self::default_path);

        let mut config = match path {
            Some(p) if p.exists() => {
                debug!(path = %p.display(), "loading config file");
                let content = std::fs::read_to_string(&p)?;
                serde_json::from_str(&content)?
            }
            _ => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CONDUCTOR_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CONDUCTOR_API_KEY") {
            self.model.api_key = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_API_BASE") {
            self.model.api_base = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_MODEL") {
            self.model.model = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_MAX_ROUTING_DECISIONS") {
            if let Ok(n) = v.parse() {
                self.limits.max_routing_decisions = n;
            }
        }
        if let Ok(v) = std::env::var("CONDUCTOR_MAX_WORKER_ROUNDS") {
            if let Ok(n) = v.parse() {
                self.limits.max_worker_rounds = n;
            }
        }
        if let Ok(v) = std::env::var("CONDUCTOR_SESSION_DIR") {
            self.session_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("CONDUCTOR_PROFILE_DIR") {
            self.profile_dir = Some(PathBuf::from(v));
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_routing_decisions == 0 {
            return Err(ConductorError::Config(
                "limits.max_routing_decisions must be nonzero".into(),
            ));
        }
        if self.limits.max_worker_rounds == 0 {
            return Err(ConductorError::Config(
                "limits.max_worker_rounds must be nonzero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConductorError::Config(
                "retry.max_attempts must be nonzero".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConductorError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.model.api_base.is_empty() {
            return Err(ConductorError::Config("model.api_base is empty".into()));
        }
        Ok(())
    }

    /// The resolved session directory.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".conductor")
                .join("sessions")
        })
    }

    /// The resolved profile directory.
    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".conductor")
                .join("profiles")
        })
    }

    /// The retry policy this config describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
        )
    }
}
