//! Runtime tunables for the bridge.
//!
//! Every value has a default and can be overridden at runtime through a
//! `CHESSBRIDGE_*` environment variable. Values that fail to parse fall back to
//! the default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 200;
const DEFAULT_URGENT_SCORE_DELTA: i32 = 15;
const DEFAULT_STICKY_MATE_MS: u64 = 1500;
const DEFAULT_STICKY_RATING_MS: u64 = 1500;
const DEFAULT_MATE_WARNING_MAX_DISTANCE: i32 = 5;
const DEFAULT_MULTIPV: u32 = 1;
const DEFAULT_THINK_TIMEOUT_SLACK_MS: u64 = 5000;
const DEFAULT_THINK_TIMEOUT_FALLBACK_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Keep a background analysis engine running.
    pub live_analysis: bool,
    /// Minimum spacing between non-urgent evaluation updates.
    pub throttle_interval_ms: u64,
    /// Score change (centipawns) that bypasses the throttle.
    pub urgent_score_delta: i32,
    pub sticky_mate_ms: u64,
    pub sticky_rating_ms: u64,
    pub show_mate_warning: bool,
    /// Mates further away than this are not announced.
    pub mate_warning_max_distance: i32,
    /// Lines the analysis engine reports; only the first drives the evaluation.
    pub multipv: u32,
    /// Added to the move time when waiting for a `bestmove`.
    pub think_timeout_slack_ms: u64,
    /// Wait for depth-limited searches, which have no move time.
    pub think_timeout_fallback_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            live_analysis: true,
            throttle_interval_ms: DEFAULT_THROTTLE_INTERVAL_MS,
            urgent_score_delta: DEFAULT_URGENT_SCORE_DELTA,
            sticky_mate_ms: DEFAULT_STICKY_MATE_MS,
            sticky_rating_ms: DEFAULT_STICKY_RATING_MS,
            show_mate_warning: true,
            mate_warning_max_distance: DEFAULT_MATE_WARNING_MAX_DISTANCE,
            multipv: DEFAULT_MULTIPV,
            think_timeout_slack_ms: DEFAULT_THINK_TIMEOUT_SLACK_MS,
            think_timeout_fallback_ms: DEFAULT_THINK_TIMEOUT_FALLBACK_MS,
        }
    }
}

impl BridgeConfig {
    /// Defaults with environment overrides applied.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `CHESSBRIDGE_LIVE_ANALYSIS` | `live_analysis` |
    /// | `CHESSBRIDGE_THROTTLE_MS` | `throttle_interval_ms` |
    /// | `CHESSBRIDGE_URGENT_DELTA` | `urgent_score_delta` |
    /// | `CHESSBRIDGE_STICKY_MATE_MS` | `sticky_mate_ms` |
    /// | `CHESSBRIDGE_STICKY_RATING_MS` | `sticky_rating_ms` |
    /// | `CHESSBRIDGE_SHOW_MATE_WARNING` | `show_mate_warning` |
    /// | `CHESSBRIDGE_MATE_WARNING_MAX` | `mate_warning_max_distance` |
    /// | `CHESSBRIDGE_MULTIPV` | `multipv` |
    /// | `CHESSBRIDGE_THINK_SLACK_MS` | `think_timeout_slack_ms` |
    /// | `CHESSBRIDGE_THINK_FALLBACK_MS` | `think_timeout_fallback_ms` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            live_analysis: parse_or(&lookup, "CHESSBRIDGE_LIVE_ANALYSIS", d.live_analysis),
            throttle_interval_ms: parse_or(
                &lookup,
                "CHESSBRIDGE_THROTTLE_MS",
                d.throttle_interval_ms,
            ),
            urgent_score_delta: parse_or(&lookup, "CHESSBRIDGE_URGENT_DELTA", d.urgent_score_delta),
            sticky_mate_ms: parse_or(&lookup, "CHESSBRIDGE_STICKY_MATE_MS", d.sticky_mate_ms),
            sticky_rating_ms: parse_or(&lookup, "CHESSBRIDGE_STICKY_RATING_MS", d.sticky_rating_ms),
            show_mate_warning: parse_or(
                &lookup,
                "CHESSBRIDGE_SHOW_MATE_WARNING",
                d.show_mate_warning,
            ),
            mate_warning_max_distance: parse_or(
                &lookup,
                "CHESSBRIDGE_MATE_WARNING_MAX",
                d.mate_warning_max_distance,
            ),
            multipv: parse_or(&lookup, "CHESSBRIDGE_MULTIPV", d.multipv).max(1),
            think_timeout_slack_ms: parse_or(
                &lookup,
                "CHESSBRIDGE_THINK_SLACK_MS",
                d.think_timeout_slack_ms,
            ),
            think_timeout_fallback_ms: parse_or(
                &lookup,
                "CHESSBRIDGE_THINK_FALLBACK_MS",
                d.think_timeout_fallback_ms,
            ),
        }
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn sticky_mate(&self) -> Duration {
        Duration::from_millis(self.sticky_mate_ms)
    }

    pub fn sticky_rating(&self) -> Duration {
        Duration::from_millis(self.sticky_rating_ms)
    }

    /// How long a move request may go without a `bestmove`.
    pub fn think_timeout(&self, params: &engine::SearchParams) -> Duration {
        if params.depth > 0 {
            Duration::from_millis(self.think_timeout_fallback_ms)
        } else {
            Duration::from_millis(params.move_time_ms + self.think_timeout_slack_ms)
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
