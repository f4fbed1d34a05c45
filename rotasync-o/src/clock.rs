/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time source abstraction.
//!
//! Every component asks a [`Clock`] for "now" instead of reading the system
//! time directly, so schedule math and sync ordering can be tested with a
//! [`ManualClock`].  All timestamps are UTC epoch milliseconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Supplies the current time as UTC epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

// ── SystemClock ───────────────────────────────────────────────────────────────

/// Wall-clock source that never goes backwards.
///
/// If the OS clock steps back (NTP correction), the last returned value is
/// repeated until the wall clock catches up again.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_ms: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let wall = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self.last_ms.fetch_max(wall, Ordering::AcqRel);
        prev.max(wall)
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

/// Settable clock for tests and simulations.
///
/// Cloning shares the underlying time, so a test can hold one handle and
/// advance it while the components under test hold another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Release);
    }

    /// Move the clock forward by `delta_ms` and return the new time.
    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}
