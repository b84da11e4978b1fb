//! Environment-driven configuration
//!
//! Binaries call `dotenv::dotenv()` first, then [`AssistantConfig::from_env`].
//! Unparsable values fall back to their defaults with a warning.

use crate::api::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE};
use crate::pipeline::stage::{DEFAULT_STAGE_MS, DEFAULT_TICK_MS};
use crate::pipeline::Pacing;
use crate::router::DEFAULT_FALLBACK_TIMEOUT;
use crate::transcript::DEFAULT_CAPACITY;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{warn, Level};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: Option<String>,
    pub port: u16,
    pub pacing: Pacing,
    pub fallback_timeout: Duration,
    pub transcript_capacity: usize,
    pub max_sessions: usize,
    pub session_idle: Duration,
    pub log_level: Level,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            port: DEFAULT_PORT,
            pacing: Pacing::default(),
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            transcript_capacity: DEFAULT_CAPACITY,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle: DEFAULT_SESSION_IDLE,
            log_level: Level::INFO,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let port_key = if lookup("PORT").is_some() { "PORT" } else { "API_PORT" };
        let port = parsed(&lookup, port_key, DEFAULT_PORT);

        let tick_ms = parsed(&lookup, "PIPELINE_TICK_MS", DEFAULT_TICK_MS).max(1);
        let stage_ms = parsed(&lookup, "PIPELINE_STAGE_MS", DEFAULT_STAGE_MS).max(1);
        let timeout_secs = parsed(
            &lookup,
            "FALLBACK_TIMEOUT_SECS",
            DEFAULT_FALLBACK_TIMEOUT.as_secs(),
        );
        let transcript_capacity = parsed(&lookup, "TRANSCRIPT_CAPACITY", DEFAULT_CAPACITY).max(1);
        let max_sessions = parsed(&lookup, "MAX_SESSIONS", DEFAULT_MAX_SESSIONS).max(1);
        let session_idle_secs = parsed(
            &lookup,
            "SESSION_IDLE_SECS",
            DEFAULT_SESSION_IDLE.as_secs(),
        );
        let log_level = parsed(&lookup, "LOG_LEVEL", Level::INFO);

        Self {
            gemini_api_key,
            port,
            pacing: Pacing::new(
                Duration::from_millis(tick_ms),
                Duration::from_millis(stage_ms),
            ),
            fallback_timeout: Duration::from_secs(timeout_secs.max(1)),
            transcript_capacity,
            max_sessions,
            session_idle: Duration::from_secs(session_idle_secs.max(1)),
            log_level,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = ?default, "Invalid config value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AssistantConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AssistantConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.pacing.stage_dwell, Duration::from_millis(DEFAULT_STAGE_MS));
        assert_eq!(config.fallback_timeout, DEFAULT_FALLBACK_TIMEOUT);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(config.session_idle, DEFAULT_SESSION_IDLE);
    }

    #[test]
    fn test_values_are_read() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "abc"),
            ("API_PORT", "9000"),
            ("PIPELINE_TICK_MS", "10"),
            ("PIPELINE_STAGE_MS", "500"),
            ("FALLBACK_TIMEOUT_SECS", "5"),
            ("TRANSCRIPT_CAPACITY", "50"),
            ("LOG_LEVEL", "debug"),
            ("MAX_SESSIONS", "25"),
            ("SESSION_IDLE_SECS", "60"),
        ]);
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.pacing.tick, Duration::from_millis(10));
        assert_eq!(config.pacing.stage_dwell, Duration::from_millis(500));
        assert_eq!(config.fallback_timeout, Duration::from_secs(5));
        assert_eq!(config.transcript_capacity, 50);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.max_sessions, 25);
        assert_eq!(config.session_idle, Duration::from_secs(60));
    }

    #[test]
    fn test_port_takes_precedence_over_api_port() {
        let config = config_from(&[("PORT", "3000"), ("API_PORT", "9000")]);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("PORT", "eighty"), ("PIPELINE_STAGE_MS", "-5"), ("GEMINI_API_KEY", "  ")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.pacing.stage_dwell, Duration::from_millis(DEFAULT_STAGE_MS));
        assert!(config.gemini_api_key.is_none());
    }
}
