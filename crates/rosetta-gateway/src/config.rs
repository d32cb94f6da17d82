//! Gateway configuration.
//!
//! Defaults are compiled in; individual fields can be overridden through
//! `ROSETTA_*` environment variables or by deserializing a partial config
//! document. Value parsing is split into pure functions (testable without
//! touching the process environment) and thin `std::env` wrappers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::LongPollConfig;

/// Env var overriding the per-session history window.
const HISTORY_CAP_VAR: &str = "ROSETTA_HISTORY_CAP";
/// Env var overriding the long-poll interval, in seconds.
const LONG_POLL_INTERVAL_VAR: &str = "ROSETTA_LONG_POLL_INTERVAL_SECS";
/// Env var overriding the long-poll patience ceiling, in seconds.
const LONG_POLL_MAX_WAIT_VAR: &str = "ROSETTA_LONG_POLL_MAX_WAIT_SECS";
/// Env var overriding the outbound connect timeout, in seconds.
const CONNECT_TIMEOUT_VAR: &str = "ROSETTA_CONNECT_TIMEOUT_SECS";

/// Tunable gateway behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Conversation turns retained per session (rounded down to even).
    pub history_cap: usize,
    /// Seconds between long-running operation polls.
    pub long_poll_interval_secs: u64,
    /// Seconds to wait on a long-running operation before giving up.
    pub long_poll_max_wait_secs: u64,
    /// Connect timeout for outbound requests, in seconds. Deliberately a
    /// connect timeout only: streamed responses have no total deadline.
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            history_cap: 10,
            long_poll_interval_secs: 10,
            long_poll_max_wait_secs: 600,
            connect_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Compiled-in defaults with any `ROSETTA_*` env overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(cap) = read_env_usize(HISTORY_CAP_VAR) {
            config.history_cap = cap;
        }
        if let Some(secs) = read_env_u64(LONG_POLL_INTERVAL_VAR) {
            config.long_poll_interval_secs = secs;
        }
        if let Some(secs) = read_env_u64(LONG_POLL_MAX_WAIT_VAR) {
            config.long_poll_max_wait_secs = secs;
        }
        if let Some(secs) = read_env_u64(CONNECT_TIMEOUT_VAR) {
            config.connect_timeout_secs = secs;
        }
        config
    }

    /// Polling cadence for the long-poll transport.
    #[must_use]
    pub fn long_poll(&self) -> LongPollConfig {
        LongPollConfig {
            interval: Duration::from_secs(self.long_poll_interval_secs),
            max_wait: Duration::from_secs(self.long_poll_max_wait_secs),
        }
    }

    /// Connect timeout for the shared HTTP client.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value parsing
// ─────────────────────────────────────────────────────────────────────────────

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

fn read_env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| parse_usize(&v))
}

fn read_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| parse_u64(&v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ──

    #[test]
    fn defaults_are_sane() {
        let config = GatewayConfig::default();
        assert_eq!(config.history_cap, 10);
        assert_eq!(config.long_poll_interval_secs, 10);
        assert_eq!(config.long_poll_max_wait_secs, 600);
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn long_poll_view_maps_to_durations() {
        let config = GatewayConfig {
            long_poll_interval_secs: 3,
            long_poll_max_wait_secs: 90,
            ..GatewayConfig::default()
        };
        let long_poll = config.long_poll();
        assert_eq!(long_poll.interval, Duration::from_secs(3));
        assert_eq!(long_poll.max_wait, Duration::from_secs(90));
    }

    // ── serde ──

    #[test]
    fn partial_document_fills_defaults() {
        let config: GatewayConfig = serde_json::from_str(r#"{"history_cap": 4}"#).unwrap();
        assert_eq!(config.history_cap, 4);
        assert_eq!(config.long_poll_interval_secs, 10);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn config_round_trips() {
        let config = GatewayConfig {
            history_cap: 6,
            long_poll_interval_secs: 2,
            long_poll_max_wait_secs: 120,
            connect_timeout_secs: 5,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    // ── value parsing ──

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_usize("12"), Some(12));
        assert_eq!(parse_u64("600"), Some(600));
    }

    #[test]
    fn parsing_trims_whitespace() {
        assert_eq!(parse_usize("  8 "), Some(8));
        assert_eq!(parse_u64("\t45\n"), Some(45));
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(parse_usize("ten"), None);
        assert_eq!(parse_usize(""), None);
        assert_eq!(parse_u64("-5"), None);
        assert_eq!(parse_u64("10s"), None);
    }
}
