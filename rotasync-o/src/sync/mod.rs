/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Multi-device sync coordinator.
//!
//! Every registered device owns a *lane*: its sync interval, its cycle lock
//! and its cancellation token.  One cycle is
//!
//! ```text
//! advance scheduler ─► snapshot ─► push (timeout) ─► health ─► status ─► event
//! ```
//!
//! and runs under the lane's lock, so timer cycles and forced syncs of the
//! same device never interleave and its events stay ordered.  Lanes of
//! different devices never wait on each other: a hung device only stalls
//! its own lane until the push timeout fires.
//!
//! Device status is written here and nowhere else after registration:
//!
//! | Outcome | Health | New status |
//! |---|---|---|
//! | failure | critical | `offline` |
//! | failure | otherwise | `error` |
//! | success | after `offline`, fewer than N good syncs | `syncing` |
//! | success | otherwise | `online` |

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::device::{Device, DeviceStatus};
use crate::event_log::{EventKind, EventLog, NewEvent};
use crate::health::{HealthMonitor, HealthState};
use crate::link::{DisplayLink, LinkError};
use crate::registry::{DeviceRegistry, RegisterRequest, Registration, RegistryError, SyncPublish};
use crate::schedule::BlockScheduler;
use crate::wire::{DeviceAck, SlotState};

// ── Public types ──────────────────────────────────────────────────────────────

/// Outcome of one sync cycle for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub device_id: String,
    pub success: bool,
    pub kind: EventKind,
    pub block_number: u32,
    pub slot_number: u32,
    /// Event timestamp, UTC epoch ms.
    pub timestamp: u64,
    pub latency_ms: Option<u64>,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate connection state across all devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    /// Every device is online.
    Connected,
    /// At least one device is waiting for a confirmed sync.
    Syncing,
    /// No devices, or all of them offline.
    Disconnected,
    /// Some devices failing while others are up.
    Error,
}

// ── Lanes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LaneState {
    /// `slot_start_time` of the last slot the device acknowledged.
    last_acked: Option<u64>,
    /// Good syncs since the device came back from `offline`.
    recovering: Option<u32>,
}

#[derive(Debug)]
struct Lane {
    cancel: CancellationToken,
    cycle: tokio::sync::Mutex<LaneState>,
    next_due_ms: AtomicU64,
    /// Set on re-registration; the next cycle starts from a clean state.
    reset: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    fn new(due_ms: u64) -> Self {
        Self {
            cancel: CancellationToken::new(),
            cycle: tokio::sync::Mutex::new(LaneState::default()),
            next_due_ms: AtomicU64::new(due_ms),
            reset: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }
}

// ── SyncCoordinator ───────────────────────────────────────────────────────────

pub struct SyncCoordinator {
    scheduler: Arc<BlockScheduler>,
    registry: Arc<DeviceRegistry>,
    health: Arc<HealthMonitor>,
    events: Arc<EventLog>,
    link: Arc<dyn DisplayLink>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    lanes: Mutex<HashMap<String, Arc<Lane>>>,
}

impl SyncCoordinator {
    pub fn new(
        scheduler: Arc<BlockScheduler>,
        registry: Arc<DeviceRegistry>,
        health: Arc<HealthMonitor>,
        events: Arc<EventLog>,
        link: Arc<dyn DisplayLink>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            scheduler,
            registry,
            health,
            events,
            link,
            clock,
            config,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    // ── Membership ────────────────────────────────────────────────────────────

    /// Register a device and open its lane.  The device is due immediately.
    ///
    /// Does not start a background task; see [`spawn`](Self::spawn).
    pub fn register(&self, req: RegisterRequest) -> Result<Registration, RegistryError> {
        let now = self.clock.now_ms();
        // Registry entry and lane change together under the lanes lock.
        let mut lanes = self.lanes.lock();
        let registration = self.registry.register(req, now)?;
        let id = registration.device.device_id.clone();
        self.health.track(&id);

        match lanes.get(&id) {
            Some(lane) => {
                lane.reset.store(true, Ordering::Release);
                lane.next_due_ms.store(now, Ordering::Release);
            }
            None => {
                lanes.insert(id, Arc::new(Lane::new(now)));
            }
        }
        Ok(registration)
    }

    /// Start the background sync loop of a registered device.
    ///
    /// Returns `false` if the device is unknown or its loop already runs.
    pub fn spawn(self: &Arc<Self>, device_id: &str) -> bool {
        let Some(lane) = self.lanes.lock().get(device_id).cloned() else {
            return false;
        };
        let mut task = lane.task.lock();
        if task.as_ref().map_or(false, |h| !h.is_finished()) {
            return false;
        }
        let this = Arc::clone(self);
        let id = device_id.to_string();
        let lane_ref = Arc::clone(&lane);
        *task = Some(tokio::spawn(async move {
            this.run_lane(id, lane_ref).await;
        }));
        true
    }

    /// Stop syncing a device and forget it.
    ///
    /// Cancels the device's loop and any push in flight, then waits for the
    /// lane to go idle: once this returns, no further event for the device
    /// reaches the log.
    pub async fn unregister(&self, device_id: &str) -> Result<Device, RegistryError> {
        let (removed, lane) = {
            let mut lanes = self.lanes.lock();
            let removed = self.registry.unregister(device_id)?;
            (removed, lanes.remove(device_id))
        };
        if let Some(lane) = &lane {
            lane.cancel.cancel();
            // In-flight cycles observe the token and bail before logging.
            drop(lane.cycle.lock().await);
            let handle = lane.task.lock().take();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
        // Re-registered while we waited: the tracker belongs to the new lane.
        if !self.lanes.lock().contains_key(device_id) {
            self.health.forget(device_id);
            self.link.release(device_id);
        }
        Ok(removed)
    }

    /// Cancel every lane and wait for the loops to finish.
    pub async fn shutdown(&self) {
        let lanes: Vec<Arc<Lane>> = self.lanes.lock().values().cloned().collect();
        for lane in &lanes {
            lane.cancel.cancel();
        }
        for lane in lanes {
            let handle = lane.task.lock().take();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
        info!("sync coordinator stopped");
    }

    // ── Sync entry points ─────────────────────────────────────────────────────

    /// Run one cycle for every device whose interval has elapsed at
    /// `now_ms`.  Due devices sync concurrently; pushes start primary
    /// devices first, then by descending sync priority.
    pub async fn tick(&self, now_ms: u64) -> Vec<SyncReport> {
        let due: Vec<(Device, Arc<Lane>)> = {
            let lanes = self.lanes.lock();
            lanes
                .iter()
                .filter(|(_, lane)| lane.next_due_ms.load(Ordering::Acquire) <= now_ms)
                .filter_map(|(id, lane)| Some((self.registry.get(id)?, Arc::clone(lane))))
                .collect()
        };
        self.run_many(due, now_ms).await
    }

    /// Push the current state now, bypassing the interval, to one device or
    /// to all of them.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] if `device_id` is not registered.
    pub async fn force_sync(&self, device_id: Option<&str>) -> Result<Vec<SyncReport>, RegistryError> {
        let targets: Vec<(Device, Arc<Lane>)> = {
            let lanes = self.lanes.lock();
            match device_id {
                Some(id) => {
                    let lane = lanes
                        .get(id)
                        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
                    let device = self
                        .registry
                        .get(id)
                        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
                    vec![(device, Arc::clone(lane))]
                }
                None => lanes
                    .iter()
                    .filter_map(|(id, lane)| Some((self.registry.get(id)?, Arc::clone(lane))))
                    .collect(),
            }
        };
        info!(target_device = ?device_id, devices = targets.len(), "forced sync");
        Ok(self.run_many(targets, self.clock.now_ms()).await)
    }

    /// Aggregate status over all registered devices.
    pub fn sync_status(&self) -> SyncStatus {
        let devices = self.registry.list(&Default::default());
        if devices.is_empty() || devices.iter().all(|d| d.status == DeviceStatus::Offline) {
            return SyncStatus::Disconnected;
        }
        if devices
            .iter()
            .any(|d| matches!(d.status, DeviceStatus::Error | DeviceStatus::Offline))
        {
            return SyncStatus::Error;
        }
        if devices.iter().any(|d| d.status == DeviceStatus::Syncing) {
            return SyncStatus::Syncing;
        }
        SyncStatus::Connected
    }

    // ── Cycle ─────────────────────────────────────────────────────────────────

    async fn run_many(&self, mut targets: Vec<(Device, Arc<Lane>)>, now_ms: u64) -> Vec<SyncReport> {
        targets.sort_by(|(a, _), (b, _)| {
            b.is_primary
                .cmp(&a.is_primary)
                .then(b.capabilities.sync_priority.cmp(&a.capabilities.sync_priority))
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        join_all(
            targets
                .iter()
                .map(|(device, lane)| self.sync_lane(&device.device_id, lane, now_ms)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn run_lane(self: Arc<Self>, device_id: String, lane: Arc<Lane>) {
        debug!(device = %device_id, "sync loop started");
        loop {
            if self.sync_lane(&device_id, &lane, self.clock.now_ms()).await.is_none()
                && lane.cancel.is_cancelled()
            {
                break;
            }
            let Some(period) = self.registry.sync_interval(&device_id) else {
                break;
            };
            tokio::select! {
                _ = lane.cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }
        debug!(device = %device_id, "sync loop stopped");
    }

    /// One cycle under the lane lock.  `None` if the lane was cancelled or
    /// the device vanished.
    async fn sync_lane(&self, device_id: &str, lane: &Lane, now_ms: u64) -> Option<SyncReport> {
        let mut st = lane.cycle.lock().await;
        if lane.cancel.is_cancelled() {
            return None;
        }
        // The lock may have been held by a slow push; never sync an older instant.
        let now_ms = self.clock.now_ms().max(now_ms);
        if lane.reset.swap(false, Ordering::AcqRel) {
            *st = LaneState::default();
        }
        let device = self.registry.get(device_id)?;
        if let Some(period) = self.registry.sync_interval(device_id) {
            lane.next_due_ms
                .store(now_ms + period.as_millis() as u64, Ordering::Release);
        }

        // Transitions up to `now` are logged before the push reflecting them.
        self.scheduler.advance(now_ms);
        let state = SlotState::from(&self.scheduler.snapshot(now_ms));

        let timeout = self.config.push_timeout();
        let started = Instant::now();
        let pushed = tokio::select! {
            _ = lane.cancel.cancelled() => return None,
            r = tokio::time::timeout(timeout, self.link.push(&device, &state)) => {
                r.unwrap_or_else(|_| Err(LinkError::Timeout(timeout)))
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let at_ms = self.clock.now_ms().max(now_ms);

        Some(self.settle(&device, &mut st, &state, pushed, latency_ms, at_ms))
    }

    /// Fold a push result into health, status and the event log.
    fn settle(
        &self,
        device: &Device,
        st: &mut LaneState,
        state: &SlotState,
        pushed: Result<DeviceAck, LinkError>,
        latency_ms: u64,
        at_ms: u64,
    ) -> SyncReport {
        let id = device.device_id.as_str();
        let previous = device.status;
        let (ack, error) = match pushed {
            Ok(ack) => (Some(ack), None),
            Err(e) => (None, Some(e)),
        };
        let success = ack.is_some();
        let latency = success.then_some(latency_ms);
        let change = self.health.record_outcome(id, success, latency);

        let status = if success {
            match st.recovering {
                Some(n) if n + 1 < self.health.recovery_successes() => {
                    st.recovering = Some(n + 1);
                    DeviceStatus::Syncing
                }
                _ => {
                    st.recovering = None;
                    DeviceStatus::Online
                }
            }
        } else if change.current == HealthState::Critical {
            st.recovering = Some(0);
            DeviceStatus::Offline
        } else {
            DeviceStatus::Error
        };

        let kind = if !success {
            EventKind::Error
        } else if matches!(previous, DeviceStatus::Error | DeviceStatus::Offline) {
            EventKind::Reconnect
        } else if st.last_acked != Some(state.slot_start_time) {
            EventKind::SlotChange
        } else {
            EventKind::Heartbeat
        };
        if success {
            st.last_acked = Some(state.slot_start_time);
        }

        self.registry.publish_sync(
            id,
            SyncPublish {
                status,
                latency_ms: latency,
                at_ms,
            },
        );
        let event = self.events.append(
            at_ms,
            NewEvent::device(id, kind, success, latency).at(state.block_number, state.slot_number),
        );

        match (&error, previous, status) {
            (Some(e), _, DeviceStatus::Offline) if previous != DeviceStatus::Offline => {
                warn!(device = %id, failures = change.consecutive_failures, error = %e, "device offline");
            }
            (Some(e), _, _) => {
                debug!(device = %id, failures = change.consecutive_failures, error = %e, "sync failed");
            }
            (None, DeviceStatus::Offline, _) => {
                info!(device = %id, latency_ms, "device reconnected");
            }
            (None, _, _) => {
                debug!(
                    device = %id,
                    block = state.block_number,
                    slot = state.slot_number,
                    latency_ms,
                    kind = ?kind,
                    "synced"
                );
            }
        }

        if let Some(ack) = ack.as_ref().filter(|a| a.render_failed) {
            if let Err(e) = self.scheduler.report_render_failure(at_ms, ack.slot_number) {
                warn!(device = %id, slot = ack.slot_number, error = %e, "render failure report ignored");
            }
        }

        SyncReport {
            device_id: id.to_string(),
            success,
            kind,
            block_number: state.block_number,
            slot_number: state.slot_number,
            timestamp: event.timestamp,
            latency_ms: latency,
            status,
            error: error.map(|e| e.to_string()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
