/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-device health classification with hysteresis.
//!
//! ```text
//!             fail / slow                 N consecutive fails
//!  healthy ───────────────► degraded ─────────────────────► critical
//!     ▲                        │  ▲                             │
//!     └── M good syncs in a row┘  └──────── good sync ──────────┘
//! ```
//!
//! A "good" sync succeeded within the latency threshold.  A slow success
//! keeps the device degraded and restarts the good streak, so a device
//! hovering around the threshold does not flap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::HealthConfig;
use crate::event_log::{EventLog, SuccessRate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
}

/// Result of one [`HealthMonitor::record_outcome`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub previous: HealthState,
    pub current: HealthState,
    pub consecutive_failures: u32,
}

impl HealthChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Aggregate view: devices per bucket and the rolling success rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub healthy: usize,
    pub degraded: usize,
    pub critical: usize,
    pub success_rate: SuccessRate,
    pub window_secs: u64,
}

impl SystemHealth {
    pub fn success_ratio(&self) -> f64 {
        self.success_rate.ratio()
    }
}

#[derive(Debug, Clone, Copy)]
struct Tracker {
    state: HealthState,
    consecutive_failures: u32,
    good_streak: u32,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_failures: 0,
            good_streak: 0,
        }
    }
}

pub struct HealthMonitor {
    config: HealthConfig,
    trackers: RwLock<HashMap<String, Tracker>>,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig, events: Arc<EventLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            trackers: RwLock::new(HashMap::new()),
            events,
            clock,
        }
    }

    /// Start tracking a device as healthy.  Re-tracking a known device
    /// resets its counters.
    pub fn track(&self, device_id: &str) {
        self.trackers
            .write()
            .insert(device_id.to_string(), Tracker::default());
    }

    pub fn forget(&self, device_id: &str) {
        self.trackers.write().remove(device_id);
    }

    /// Fold one sync outcome into the device's classification.
    ///
    /// `latency_ms` is ignored for failed syncs.  Unknown devices are
    /// tracked on first use.
    pub fn record_outcome(
        &self,
        device_id: &str,
        success: bool,
        latency_ms: Option<u64>,
    ) -> HealthChange {
        let mut trackers = self.trackers.write();
        let t = trackers.entry(device_id.to_string()).or_default();
        let previous = t.state;

        if !success {
            t.good_streak = 0;
            t.consecutive_failures = t.consecutive_failures.saturating_add(1);
            t.state = if t.consecutive_failures >= self.config.critical_after_failures {
                HealthState::Critical
            } else {
                HealthState::Degraded
            };
        } else {
            t.consecutive_failures = 0;
            let slow = latency_ms.map_or(false, |ms| ms > self.config.latency_threshold_ms);
            if slow {
                t.good_streak = 0;
                t.state = HealthState::Degraded;
            } else {
                t.good_streak = t.good_streak.saturating_add(1);
                t.state = match previous {
                    HealthState::Healthy => HealthState::Healthy,
                    _ if t.good_streak >= self.config.recovery_successes => HealthState::Healthy,
                    _ => HealthState::Degraded,
                };
            }
        }

        let change = HealthChange {
            previous,
            current: t.state,
            consecutive_failures: t.consecutive_failures,
        };
        drop(trackers);

        if change.changed() {
            if change.current == HealthState::Critical {
                warn!(
                    device = %device_id,
                    failures = change.consecutive_failures,
                    "device health critical"
                );
            } else {
                info!(
                    device = %device_id,
                    from = ?change.previous,
                    to = ?change.current,
                    "device health changed"
                );
            }
        }
        change
    }

    /// Good syncs in a row needed to leave degraded or critical.
    pub fn recovery_successes(&self) -> u32 {
        self.config.recovery_successes
    }

    pub fn health_of(&self, device_id: &str) -> Option<HealthState> {
        self.trackers.read().get(device_id).map(|t| t.state)
    }

    pub fn consecutive_failures(&self, device_id: &str) -> u32 {
        self.trackers
            .read()
            .get(device_id)
            .map_or(0, |t| t.consecutive_failures)
    }

    /// Bucket counts over tracked devices plus the device sync success rate
    /// over the last `window_secs` of the event log.
    pub fn system_health(&self) -> SystemHealth {
        let (mut healthy, mut degraded, mut critical) = (0, 0, 0);
        for t in self.trackers.read().values() {
            match t.state {
                HealthState::Healthy => healthy += 1,
                HealthState::Degraded => degraded += 1,
                HealthState::Critical => critical += 1,
            }
        }
        let window_ms = self.config.window_secs * 1_000;
        SystemHealth {
            healthy,
            degraded,
            critical,
            success_rate: self.events.success_rate(self.clock.now_ms(), window_ms),
            window_secs: self.config.window_secs,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
