//! Runtime settings.
//!
//! [`RuntimeSettings`] is an explicit context object handed to the task
//! runner; there is no process-wide configuration. It can be built in code,
//! deserialized (durations are float seconds), or read from `HAM_*`
//! environment variables.

use crate::errors::{HamError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Prefix shared by every environment variable read by [`RuntimeSettings::from_env`].
pub const ENV_PREFIX: &str = "HAM_";

/// Settings for task execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Worker threads for parallel runs. `None` picks a default from the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Per-task timeout for parallel runs.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_duration_serde"
    )]
    pub task_timeout: Option<Duration>,

    /// Whether the first task error aborts a run.
    #[serde(default)]
    pub raise_on_error: bool,

    /// Debug output.
    #[serde(default)]
    pub debug: bool,

    /// Verbose output.
    #[serde(default)]
    pub verbose: bool,

    /// Default retry behavior.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl RuntimeSettings {
    /// Create default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max workers.
    #[must_use]
    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    /// Set the per-task timeout.
    #[must_use]
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Set raise-on-error.
    #[must_use]
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    /// Set debug.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set verbose.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set retry settings.
    #[must_use]
    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Keys are the full variable names, e.g. `HAM_MAX_WORKERS`. Unset keys
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();
        if let Some(v) = get("MAX_WORKERS") {
            settings.max_workers = Some(parse_value("HAM_MAX_WORKERS", &v)?);
        }
        if let Some(v) = get("TASK_TIMEOUT") {
            settings.task_timeout = Some(parse_secs("HAM_TASK_TIMEOUT", &v)?);
        }
        if let Some(v) = get("RAISE_ON_ERROR") {
            settings.raise_on_error = parse_bool("HAM_RAISE_ON_ERROR", &v)?;
        }
        if let Some(v) = get("DEBUG") {
            settings.debug = parse_bool("HAM_DEBUG", &v)?;
        }
        if let Some(v) = get("VERBOSE") {
            settings.verbose = parse_bool("HAM_VERBOSE", &v)?;
        }

        let retry = &mut settings.retry;
        if let Some(v) = get("RETRY_MAX_ATTEMPTS") {
            retry.max_attempts = parse_value("HAM_RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("RETRY_INITIAL_DELAY") {
            retry.initial_delay = parse_secs("HAM_RETRY_INITIAL_DELAY", &v)?;
        }
        if let Some(v) = get("RETRY_MAX_DELAY") {
            retry.max_delay = parse_secs("HAM_RETRY_MAX_DELAY", &v)?;
        }
        if let Some(v) = get("RETRY_BACKOFF") {
            retry.backoff = parse_value("HAM_RETRY_BACKOFF", &v)?;
        }
        if let Some(v) = get("RETRY_JITTER") {
            retry.jitter = Some(parse_secs("HAM_RETRY_JITTER", &v)?);
        }
        if let Some(v) = get("RETRY_RERAISE") {
            retry.reraise = parse_bool("HAM_RETRY_RERAISE", &v)?;
        }

        settings.validate()?;
        debug!(settings = ?settings, "Loaded runtime settings");
        Ok(settings)
    }

    /// Check the settings for values the runner cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == Some(0) {
            return Err(HamError::configuration("max_workers must be at least 1"));
        }
        self.retry.validate()
    }
}

/// Default retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum attempts, including the first try.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_serde")]
    pub initial_delay: Duration,
    /// Cap on any single delay.
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff: f64,
    /// Upper bound of the random delay added to each wait.
    #[serde(skip_serializing_if = "Option::is_none", with = "option_duration_serde")]
    pub jitter: Option<Duration>,
    /// Whether the last error surfaces as itself once attempts run out.
    pub reraise: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: 2.0,
            jitter: None,
            reraise: true,
        }
    }
}

impl RetrySettings {
    /// Check the retry settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(HamError::configuration("retry max_attempts must be at least 1"));
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(HamError::configuration(format!(
                "retry backoff must be a finite number >= 1.0, got {}",
                self.backoff
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(HamError::configuration(format!(
                "retry initial_delay ({:?}) exceeds max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| HamError::configuration(format!("{} = {:?}: {}", key, raw, e)))
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = parse_value(key, raw)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| HamError::configuration(format!("{} = {:?}: {}", key, raw, e)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HamError::configuration(format!(
            "{} = {:?}: expected a boolean",
            key, raw
        ))),
    }
}

/// Serde helper for Duration as float seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for optional Duration.
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_secs_f64().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<f64> = Option::deserialize(deserializer)?;
        opt.map(Duration::try_from_secs_f64)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::new();
        assert_eq!(settings.max_workers, None);
        assert!(!settings.raise_on_error);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(settings.retry.max_delay, Duration::from_secs(60));
        assert!(settings.retry.reraise);
    }

    #[test]
    fn test_from_lookup() {
        let settings = RuntimeSettings::from_lookup(lookup(&[
            ("HAM_MAX_WORKERS", "8"),
            ("HAM_TASK_TIMEOUT", "2.5"),
            ("HAM_RAISE_ON_ERROR", "true"),
            ("HAM_DEBUG", "1"),
            ("HAM_RETRY_MAX_ATTEMPTS", "5"),
            ("HAM_RETRY_INITIAL_DELAY", "0.5"),
            ("HAM_RETRY_JITTER", "0.1"),
            ("HAM_RETRY_RERAISE", "no"),
        ]))
        .unwrap();

        assert_eq!(settings.max_workers, Some(8));
        assert_eq!(settings.task_timeout, Some(Duration::from_millis(2500)));
        assert!(settings.raise_on_error);
        assert!(settings.debug);
        assert!(!settings.verbose);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(settings.retry.jitter, Some(Duration::from_millis(100)));
        assert!(!settings.retry.reraise);
    }

    #[test]
    fn test_from_lookup_empty_keeps_defaults() {
        let settings = RuntimeSettings::from_lookup(lookup(&[("HAM_MAX_WORKERS", "  ")])).unwrap();
        assert_eq!(settings, RuntimeSettings::default());
    }

    #[test]
    fn test_from_lookup_rejects_malformed() {
        let err = RuntimeSettings::from_lookup(lookup(&[("HAM_MAX_WORKERS", "many")])).unwrap_err();
        assert!(err.to_string().contains("HAM_MAX_WORKERS"));

        let err = RuntimeSettings::from_lookup(lookup(&[("HAM_DEBUG", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("expected a boolean"));

        let err =
            RuntimeSettings::from_lookup(lookup(&[("HAM_TASK_TIMEOUT", "-1")])).unwrap_err();
        assert!(matches!(err, HamError::Configuration(_)));
    }

    #[test]
    fn test_validate() {
        assert!(RuntimeSettings::new().max_workers(0).validate().is_err());

        let retry = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(retry.validate().is_err());

        let retry = RetrySettings {
            backoff: 0.5,
            ..Default::default()
        };
        assert!(retry.validate().is_err());

        let retry = RetrySettings {
            initial_delay: Duration::from_secs(120),
            ..Default::default()
        };
        assert!(retry.validate().is_err());
    }

    #[test]
    fn test_serde_seconds() {
        let settings = RuntimeSettings::new()
            .max_workers(4)
            .task_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["max_workers"], 4);
        assert_eq!(json["task_timeout"], 1.5);
        assert_eq!(json["retry"]["initial_delay"], 1.0);

        let parsed: RuntimeSettings =
            serde_json::from_str(r#"{"max_workers": 2, "retry": {"max_attempts": 7}}"#).unwrap();
        assert_eq!(parsed.max_workers, Some(2));
        assert_eq!(parsed.task_timeout, None);
        assert_eq!(parsed.retry.max_attempts, 7);
        assert_eq!(parsed.retry.backoff, 2.0);
    }
}
