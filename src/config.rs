//! Configuration types.
//!
//! Everything is read from environment variables. Each `from_env` has a
//! `from_lookup` twin that takes the variable source as a closure, so tests
//! never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Review pipeline configuration.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Time between poller ticks.
    pub poll_interval: Duration,
    /// Reviewer allowlist: exact addresses, `@domain`, `domain`, or `*`.
    pub allowed_reviewers: Vec<String>,
    /// Token that marks a review subject (`<marker>: <contract id>`).
    pub subject_marker: String,
    /// Skip the rest of the tick after routing a malformed review subject.
    pub abort_tick_on_malformed_subject: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            allowed_reviewers: Vec::new(),
            subject_marker: "Reviewal".to_string(),
            abort_tick_on_malformed_subject: true,
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_secs: u64 = parse_var(&lookup, "REVIEW_POLL_INTERVAL_SECS")?
            .unwrap_or(defaults.poll_interval.as_secs());
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REVIEW_POLL_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        let subject_marker = lookup("REVIEW_SUBJECT_MARKER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.subject_marker);

        Ok(Self {
            poll_interval: Duration::from_secs(poll_secs),
            allowed_reviewers: list_var(&lookup, "REVIEW_ALLOWED_REVIEWERS"),
            subject_marker,
            abort_tick_on_malformed_subject: bool_var(&lookup, "REVIEW_ABORT_TICK_ON_MALFORMED")?
                .unwrap_or(defaults.abort_tick_on_malformed_subject),
        })
    }
}

/// Where the binary keeps its state.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Directory for daily rolling log files. Logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/review-intake.db"),
            log_dir: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: lookup("REVIEW_DB_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| Self::default().db_path),
            log_dir: lookup("REVIEW_LOG_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse an optional variable, rejecting values that do not parse.
pub(crate) fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

/// Comma-separated list; blanks dropped.
fn list_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Vec<String> {
    lookup(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn bool_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
