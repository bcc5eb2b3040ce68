//! Circuit breaker state shared with observers.
//!
//! # State transitions
//!
//! ```text
//! Closed   → Open:     failure_threshold failures inside the failure window
//! Open     → HalfOpen: cool-down elapsed (evaluated lazily on read)
//! HalfOpen → Closed:   trial call succeeds
//! HalfOpen → Open:     trial call fails, cool-down restarts
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PluginId;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cool-down elapses.
    Open,
    /// The next call is a trial that decides between `Closed` and `Open`.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Point-in-time view of one plugin's breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// The guarded plugin.
    pub plugin_id: PluginId,
    /// Current state.
    pub state: BreakerState,
    /// Failures counted toward (or that caused) the current trip.
    pub failure_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure_time: Option<DateTime<Utc>>,
    /// When an open breaker becomes eligible for a trial call.
    pub next_retry_time: Option<DateTime<Utc>>,
    /// Latency reported with the most recent outcome, in milliseconds.
    pub last_latency_ms: Option<u64>,
    /// Successful calls since registration.
    pub total_successes: u64,
    /// Failed calls since registration, including simulated ones.
    pub total_failures: u64,
    /// Calls short-circuited while open.
    pub rejected_calls: u64,
}

impl BreakerStatus {
    /// A fresh, closed breaker.
    #[must_use]
    pub fn closed(plugin_id: PluginId) -> Self {
        Self {
            plugin_id,
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            next_retry_time: None,
            last_latency_ms: None,
            total_successes: 0,
            total_failures: 0,
            rejected_calls: 0,
        }
    }
}
