//! Circuit breaker manager.
//!
//! One breaker per registered plugin. See [`keystone_core::breaker`] for the
//! state diagram.
//!
//! There is no background timer: every operation first checks whether an
//! open breaker's cool-down has elapsed against the injected [`Clock`] and,
//! if so, moves it to `HalfOpen`. State changes are queued and handed to the
//! runtime through [`BreakerManager::drain_transitions`] so that it can
//! update plugin status and propagate in the same batch.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use keystone_core::{BreakerState, BreakerStatus, Clock, PluginId};

use crate::error::{PluginError, PluginResult};

/// Breaker tuning shared by every plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures within `failure_window` that trip the breaker. Zero is
    /// treated as one.
    pub failure_threshold: u32,
    /// Sliding window failures are counted in.
    pub failure_window: Duration,
    /// How long a tripped breaker stays open before allowing a trial call.
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(5),
            cool_down: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    fn threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }
}

/// A breaker state change waiting to be applied by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerTransition {
    /// The guarded plugin.
    pub plugin_id: PluginId,
    /// Previous state.
    pub from: BreakerState,
    /// New state.
    pub to: BreakerState,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Outcome of asking a breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed. `HalfOpen` means this is the trial call.
    Allowed {
        /// Breaker state at admission time.
        state: BreakerState,
    },
    /// The breaker is open and its cool-down has not elapsed.
    Rejected {
        /// When a trial call will be allowed.
        retry_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug)]
struct Breaker {
    status: BreakerStatus,
    recent_failures: VecDeque<DateTime<Utc>>,
}

/// Tracks one circuit breaker per plugin.
pub struct BreakerManager {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: Vec<Breaker>,
    index: HashMap<PluginId, usize>,
    pending: Vec<BreakerTransition>,
}

impl BreakerManager {
    /// Create a manager with no breakers.
    #[must_use]
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breakers: Vec::new(),
            index: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Create a closed breaker for a plugin. Returns `false` if one exists.
    pub fn register(&mut self, plugin_id: PluginId) -> bool {
        if self.index.contains_key(&plugin_id) {
            return false;
        }
        self.index.insert(plugin_id.clone(), self.breakers.len());
        self.breakers.push(Breaker {
            status: BreakerStatus::closed(plugin_id),
            recent_failures: VecDeque::new(),
        });
        true
    }

    /// Number of tracked breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breakers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Last computed status, without re-evaluating the cool-down.
    #[must_use]
    pub fn peek(&self, plugin_id: &PluginId) -> Option<&BreakerStatus> {
        self.index.get(plugin_id).map(|&i| &self.breakers[i].status)
    }

    /// Whether the breaker is open or half-open, as last computed.
    #[must_use]
    pub fn is_tripped(&self, plugin_id: &PluginId) -> bool {
        self.peek(plugin_id)
            .is_some_and(|s| s.state != BreakerState::Closed)
    }

    /// Current status of one breaker.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn status(&mut self, plugin_id: &PluginId) -> PluginResult<BreakerStatus> {
        let now = self.clock.now();
        let breaker = self.refreshed(plugin_id, now)?;
        Ok(breaker.status.clone())
    }

    /// Current status of every breaker, in registration order.
    pub fn all_status(&mut self) -> Vec<BreakerStatus> {
        self.refresh_all();
        self.breakers.iter().map(|b| b.status.clone()).collect()
    }

    /// Move every breaker whose cool-down has elapsed to `HalfOpen` and
    /// forget failures that have left the window.
    pub fn refresh_all(&mut self) {
        let now = self.clock.now();
        let window = to_delta(self.config.failure_window);
        for breaker in &mut self.breakers {
            if let Some(transition) = refresh(breaker, now, window) {
                self.pending.push(transition);
            }
        }
    }

    /// Decide whether a call to the plugin may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn admit(&mut self, plugin_id: &PluginId) -> PluginResult<Admission> {
        let now = self.clock.now();
        let breaker = self.refreshed(plugin_id, now)?;
        let status = &mut breaker.status;

        if status.state == BreakerState::Open {
            status.rejected_calls = status.rejected_calls.saturating_add(1);
            debug!(plugin_id = %plugin_id, retry_at = ?status.next_retry_time, "Call rejected, breaker open");
            return Ok(Admission::Rejected {
                retry_at: status.next_retry_time,
            });
        }
        Ok(Admission::Allowed {
            state: status.state,
        })
    }

    /// Record a successful call.
    ///
    /// A success in `HalfOpen` closes the breaker; in `Closed` it clears the
    /// failure window.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn record_success(
        &mut self,
        plugin_id: &PluginId,
        latency_ms: u64,
    ) -> PluginResult<BreakerStatus> {
        let now = self.clock.now();
        let breaker = self.refreshed(plugin_id, now)?;
        breaker.status.total_successes = breaker.status.total_successes.saturating_add(1);
        breaker.status.last_latency_ms = Some(latency_ms);

        let transition = match breaker.status.state {
            BreakerState::HalfOpen => {
                close(breaker);
                info!(plugin_id = %plugin_id, "Trial call succeeded, breaker closed");
                Some(BreakerTransition {
                    plugin_id: plugin_id.clone(),
                    from: BreakerState::HalfOpen,
                    to: BreakerState::Closed,
                    at: now,
                })
            },
            BreakerState::Closed => {
                breaker.recent_failures.clear();
                breaker.status.failure_count = 0;
                None
            },
            // A call admitted before the breaker tripped finished late.
            BreakerState::Open => None,
        };

        let status = breaker.status.clone();
        self.pending.extend(transition);
        Ok(status)
    }

    /// Record a failed call.
    ///
    /// In `Closed`, failures older than the window are forgotten and the
    /// breaker trips once the threshold is reached. In `HalfOpen` the trial
    /// call failed and the breaker re-opens with a fresh cool-down. In `Open`
    /// the failure is counted in the totals only.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn record_failure(
        &mut self,
        plugin_id: &PluginId,
        latency_ms: Option<u64>,
    ) -> PluginResult<BreakerStatus> {
        let now = self.clock.now();
        let config = self.config;
        let breaker = self.refreshed(plugin_id, now)?;
        breaker.status.total_failures = breaker.status.total_failures.saturating_add(1);
        breaker.status.last_failure_time = Some(now);
        if latency_ms.is_some() {
            breaker.status.last_latency_ms = latency_ms;
        }

        let from = breaker.status.state;
        let tripped = match from {
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                breaker.status.failure_count = breaker.status.failure_count.saturating_add(1);
                true
            },
            BreakerState::Closed => {
                breaker.recent_failures.push_back(now);
                breaker.status.failure_count =
                    u32::try_from(breaker.recent_failures.len()).unwrap_or(u32::MAX);
                breaker.status.failure_count >= config.threshold()
            },
        };

        if tripped {
            open(breaker, now, config.cool_down);
        }
        let status = breaker.status.clone();

        if tripped {
            warn!(
                plugin_id = %plugin_id,
                failure_count = status.failure_count,
                retry_at = ?status.next_retry_time,
                "Circuit breaker opened"
            );
            self.pending.push(BreakerTransition {
                plugin_id: plugin_id.clone(),
                from,
                to: BreakerState::Open,
                at: now,
            });
        } else {
            debug!(
                plugin_id = %plugin_id,
                failure_count = status.failure_count,
                state = %status.state,
                "Recorded failure"
            );
        }
        Ok(status)
    }

    /// Force a breaker closed and clear its failure counts.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn reset(&mut self, plugin_id: &PluginId) -> PluginResult<BreakerStatus> {
        let now = self.clock.now();
        let breaker = self.refreshed(plugin_id, now)?;
        let from = breaker.status.state;
        close(breaker);
        let status = breaker.status.clone();

        if from != BreakerState::Closed {
            info!(plugin_id = %plugin_id, from = %from, "Circuit breaker reset");
            self.pending.push(BreakerTransition {
                plugin_id: plugin_id.clone(),
                from,
                to: BreakerState::Closed,
                at: now,
            });
        }
        Ok(status)
    }

    /// Take the state changes queued since the last call.
    pub fn drain_transitions(&mut self) -> Vec<BreakerTransition> {
        std::mem::take(&mut self.pending)
    }

    fn refreshed(&mut self, plugin_id: &PluginId, now: DateTime<Utc>) -> PluginResult<&mut Breaker> {
        let &position = self
            .index
            .get(plugin_id)
            .ok_or_else(|| PluginError::NotFound(plugin_id.clone()))?;
        let window = to_delta(self.config.failure_window);
        let breaker = &mut self.breakers[position];
        if let Some(transition) = refresh(breaker, now, window) {
            self.pending.push(transition);
        }
        Ok(breaker)
    }
}

impl std::fmt::Debug for BreakerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerManager")
            .field("config", &self.config)
            .field("breaker_count", &self.breakers.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Open → HalfOpen once the cool-down has elapsed. In `Closed`, failures
/// at least one window old are dropped.
fn refresh(
    breaker: &mut Breaker,
    now: DateTime<Utc>,
    window: TimeDelta,
) -> Option<BreakerTransition> {
    if breaker.status.state == BreakerState::Closed {
        forget_expired(breaker, now, window);
        return None;
    }
    let status = &mut breaker.status;
    if status.state != BreakerState::Open {
        return None;
    }
    if status.next_retry_time.is_some_and(|retry| now < retry) {
        return None;
    }
    status.state = BreakerState::HalfOpen;
    debug!(plugin_id = %status.plugin_id, "Cool-down elapsed, breaker half-open");
    Some(BreakerTransition {
        plugin_id: status.plugin_id.clone(),
        from: BreakerState::Open,
        to: BreakerState::HalfOpen,
        at: now,
    })
}

fn forget_expired(breaker: &mut Breaker, now: DateTime<Utc>, window: TimeDelta) {
    while breaker
        .recent_failures
        .front()
        .is_some_and(|&t| now.signed_duration_since(t) >= window)
    {
        breaker.recent_failures.pop_front();
    }
    breaker.status.failure_count =
        u32::try_from(breaker.recent_failures.len()).unwrap_or(u32::MAX);
}

fn open(breaker: &mut Breaker, now: DateTime<Utc>, cool_down: Duration) {
    breaker.recent_failures.clear();
    breaker.status.state = BreakerState::Open;
    breaker.status.next_retry_time = Some(
        now.checked_add_signed(to_delta(cool_down))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    );
}

fn close(breaker: &mut Breaker) {
    breaker.recent_failures.clear();
    breaker.status.state = BreakerState::Closed;
    breaker.status.failure_count = 0;
    breaker.status.next_retry_time = None;
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
