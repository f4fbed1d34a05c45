/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Operator control endpoint: one JSON request per line, one JSON reply per
//! line.
//!
//! ```text
//! {"op":"register","deviceId":"ipad01","deviceType":"tablet","capabilities":{"refreshRate":60}}
//! {"op":"forceSync","deviceId":"ipad01"}
//! {"op":"health"}
//! ```
//!
//! Replies are `{"ok":true,"result":…}` or `{"ok":false,"error":"…"}`.  A
//! rejected registration is still `ok` with `accepted: false`, matching the
//! registration contract.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::device::DeviceStatus;
use crate::health::HealthState;
use crate::layers::LayerConfig;
use crate::registry::{DeviceFilter, RegisterRequest, RegistryError};
use crate::schedule::{BlockScheduler, ScheduleError};
use crate::sync::{SyncCoordinator, SyncReport, SyncStatus};

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ControlRequest {
    Register(RegisterRequest),
    #[serde(rename_all = "camelCase")]
    Unregister {
        device_id: String,
    },
    /// Omit `deviceId` to sync every device.
    #[serde(rename_all = "camelCase")]
    ForceSync {
        #[serde(default)]
        device_id: Option<String>,
    },
    Health,
    Current,
    Block,
    Skip,
    Pause,
    Resume,
    Layers,
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_sync_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPushResponse {
    pub device_id: String,
    pub success: bool,
    pub slot_number: u32,
    pub block_number: u32,
    pub timestamp: u64,
    pub latency_ms: Option<u64>,
}

impl From<SyncReport> for SyncPushResponse {
    fn from(r: SyncReport) -> Self {
        Self {
            device_id: r.device_id,
            success: r.success,
            slot_number: r.slot_number,
            block_number: r.block_number,
            timestamp: r.timestamp,
            latency_ms: r.latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHealth {
    pub device_id: String,
    pub status: DeviceStatus,
    pub latency_ms: Option<u64>,
    pub health: HealthState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub devices: Vec<DeviceHealth>,
    pub system_success_rate: f64,
    pub healthy: usize,
    pub degraded: usize,
    pub critical: usize,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipResponse {
    pub block_number: u32,
    pub skipped_slot: u32,
    pub active_slot: u32,
}

#[derive(Debug, Serialize)]
struct Reply {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("malformed request: {0}")]
    BadRequest(#[source] serde_json::Error),

    #[error("cannot encode reply: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// Executes control requests against the running components.
pub struct ControlHandler {
    coordinator: Arc<SyncCoordinator>,
    scheduler: Arc<BlockScheduler>,
    clock: Arc<dyn Clock>,
    layers: LayerConfig,
    /// Start a background lane for devices registered here.
    spawn_lanes: bool,
}

impl ControlHandler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        scheduler: Arc<BlockScheduler>,
        clock: Arc<dyn Clock>,
        layers: LayerConfig,
        spawn_lanes: bool,
    ) -> Self {
        Self {
            coordinator,
            scheduler,
            clock,
            layers,
            spawn_lanes,
        }
    }

    /// Parse and execute one request line, returning the reply line
    /// (without the trailing newline).
    pub async fn handle_line(&self, line: &str) -> String {
        let reply = match serde_json::from_str::<ControlRequest>(line) {
            Ok(req) => match self.handle(req).await {
                Ok(value) => Reply {
                    ok: true,
                    result: Some(value),
                    error: None,
                },
                Err(e) => Reply {
                    ok: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            },
            Err(e) => Reply {
                ok: false,
                result: None,
                error: Some(ControlError::BadRequest(e).to_string()),
            },
        };
        serde_json::to_string(&reply)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"reply encoding failed: {e}"}}"#))
    }

    pub async fn handle(&self, req: ControlRequest) -> Result<serde_json::Value, ControlError> {
        let value = match req {
            ControlRequest::Register(r) => serde_json::to_value(self.register(r))?,
            ControlRequest::Unregister { device_id } => {
                let device = self.coordinator.unregister(&device_id).await?;
                serde_json::to_value(device)?
            }
            ControlRequest::ForceSync { device_id } => {
                let reports = self.coordinator.force_sync(device_id.as_deref()).await?;
                let pushes: Vec<SyncPushResponse> = reports.into_iter().map(Into::into).collect();
                serde_json::to_value(pushes)?
            }
            ControlRequest::Health => serde_json::to_value(self.health_report())?,
            ControlRequest::Current => {
                serde_json::to_value(self.scheduler.snapshot(self.clock.now_ms()))?
            }
            ControlRequest::Block => {
                serde_json::to_value(self.scheduler.current_block(self.clock.now_ms()))?
            }
            ControlRequest::Skip => {
                let now = self.clock.now_ms();
                let t = self.scheduler.skip(now)?;
                serde_json::to_value(SkipResponse {
                    block_number: t.block_number,
                    skipped_slot: t.slot_number,
                    active_slot: self.scheduler.current_slot(now).slot_number,
                })?
            }
            ControlRequest::Pause => {
                let now = self.clock.now_ms();
                self.scheduler.pause(now);
                serde_json::to_value(self.scheduler.snapshot(now))?
            }
            ControlRequest::Resume => {
                let now = self.clock.now_ms();
                self.scheduler.resume(now);
                serde_json::to_value(self.scheduler.snapshot(now))?
            }
            ControlRequest::Layers => serde_json::to_value(&self.layers)?,
        };
        Ok(value)
    }

    fn register(&self, req: RegisterRequest) -> RegisterResponse {
        let device_id = req.device_id.clone();
        match self.coordinator.register(req) {
            Ok(reg) => {
                if self.spawn_lanes {
                    self.coordinator.spawn(&device_id);
                }
                RegisterResponse {
                    accepted: true,
                    assigned_sync_interval_ms: Some(reg.sync_interval.as_millis() as u64),
                    reason: None,
                }
            }
            Err(e) => {
                warn!(device = %device_id, reason = %e, "registration rejected");
                RegisterResponse {
                    accepted: false,
                    assigned_sync_interval_ms: None,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    pub fn health_report(&self) -> HealthReport {
        let monitor = self.coordinator.health();
        let devices = self
            .coordinator
            .registry()
            .list(&DeviceFilter::default())
            .into_iter()
            .map(|d| DeviceHealth {
                health: monitor
                    .health_of(&d.device_id)
                    .unwrap_or(HealthState::Healthy),
                device_id: d.device_id,
                status: d.status,
                latency_ms: d.latency_ms,
            })
            .collect();
        let system = monitor.system_health();
        HealthReport {
            devices,
            system_success_rate: system.success_ratio(),
            healthy: system.healthy,
            degraded: system.degraded,
            critical: system.critical,
            sync_status: self.coordinator.sync_status(),
        }
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Accept control connections until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, handler: Arc<ControlHandler>, shutdown: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "control endpoint listening");
    }
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(connection(stream, peer, Arc::clone(&handler), shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "control accept failed"),
            },
        }
    }
    info!("control endpoint stopped");
}

async fn connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<ControlHandler>,
    shutdown: CancellationToken,
) {
    debug!(%peer, "control client connected");
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(%peer, error = %e, "control read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = handler.handle_line(&line).await;
        reply.push('\n');
        if let Err(e) = write.write_all(reply.as_bytes()).await {
            debug!(%peer, error = %e, "control write failed");
            break;
        }
    }
    debug!(%peer, "control client disconnected");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
