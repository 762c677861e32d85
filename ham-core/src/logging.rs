//! Logging setup on top of `tracing-subscriber`.

use crate::errors::{HamError, Result};
use crate::settings::RuntimeSettings;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Full filter directive; overrides `level` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Whether to print the event target.
    #[serde(default)]
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            filter: None,
            format: LogFormat::default(),
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Create the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the level from the `debug`/`verbose` flags.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let level = if settings.debug {
            "debug"
        } else if settings.verbose {
            "info"
        } else {
            "warn"
        };
        Self {
            level: level.to_string(),
            ..Self::default()
        }
    }

    /// Set the level.
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set a filter directive such as `ham_runtime=debug,info`.
    #[must_use]
    pub fn filter(mut self, directive: impl Into<String>) -> Self {
        self.filter = Some(directive.into());
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Print event targets.
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Build the filter for this config.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let directive = self.filter.as_deref().unwrap_or(&self.level);
        EnvFilter::try_new(directive).map_err(|e| {
            HamError::configuration(format!("invalid log filter {:?}: {}", directive, e))
        })
    }
}

/// Install a global subscriber for `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| HamError::configuration(format!("failed to install logger: {}", e)))
}
