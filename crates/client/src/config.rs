//! Configuration management for the DWN client.
//!
//! Settings live in `<config dir>/dwn-client/config.toml`; every field has a
//! default, so an empty or missing file is valid.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dwn_protocol::DEFAULT_INLINE_THRESHOLD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A field outside its allowed range.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("inline_threshold must be between 1 and 1048576, got {0}")]
    InvalidInlineThreshold(usize),

    #[error("request_timeout_secs must be between 1 and 600, got {0}")]
    InvalidRequestTimeout(u64),

    #[error("user_agent must not be empty")]
    EmptyUserAgent,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Levels accepted by the tracing filter.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest accepted inline threshold.
const MAX_INLINE_THRESHOLD: usize = 1024 * 1024;

/// Main configuration structure for the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Client behaviour.
    pub client: ClientSection,

    /// Remote transport settings.
    pub transport: TransportSection,
}

/// Client behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSection {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Payloads at or below this size in bytes travel inline.
    pub inline_threshold: usize,
}

/// Remote transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportSection {
    /// Per-request timeout for remote nodes.
    pub request_timeout_secs: u64,

    /// User agent sent to remote nodes.
    pub user_agent: String,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: format!("dwn-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportSection {
    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `<config dir>/dwn-client/config.toml`, or relative to the working
/// directory when the platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dwn-client")
        .join("config.toml")
}

impl ClientConfig {
    /// Applies `DWN_LOG_LEVEL` and `DWN_INLINE_THRESHOLD` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("DWN_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!(%level, "log_level set from DWN_LOG_LEVEL");
                self.client.log_level = level;
            }
        }

        if let Ok(threshold) = std::env::var("DWN_INLINE_THRESHOLD") {
            match threshold.parse::<usize>() {
                Ok(value) => {
                    tracing::info!(value, "inline_threshold set from DWN_INLINE_THRESHOLD");
                    self.client.inline_threshold = value;
                }
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric DWN_INLINE_THRESHOLD: {}", threshold);
                }
            }
        }
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.client.inline_threshold;
        if threshold == 0 || threshold > MAX_INLINE_THRESHOLD {
            return Err(ConfigError::InvalidInlineThreshold(threshold));
        }

        let timeout = self.transport.request_timeout_secs;
        if !(1..=600).contains(&timeout) {
            return Err(ConfigError::InvalidRequestTimeout(timeout));
        }

        if self.transport.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyUserAgent);
        }

        let level = self.client.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.client.log_level.clone()));
        }

        Ok(())
    }

    /// Reads the TOML file at `path`; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No client config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        };
        Self::from_toml(&contents).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// Reads [`default_config_path`].
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| anyhow!("bad client config: {}", describe_toml_error(&e)))
    }

    /// Writes the config to `path`, creating missing directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        }
        fs::write(path, self.to_toml()?).with_context(|| format!("cannot write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Saved client config");
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("cannot encode client config as TOML")
    }
}

fn describe_toml_error(error: &toml::de::Error) -> String {
    match error.span() {
        Some(span) => format!("{} (bytes {}..{})", error.message(), span.start, span.end),
        None => error.message().to_string(),
    }
}
