/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Known devices, their capabilities and last published status.
//!
//! Registration is idempotent by `device_id`.  Status and latency are written
//! only through [`DeviceRegistry::publish_sync`], which the device's own sync
//! task calls; everyone else reads cloned snapshots.  Devices that go offline
//! stay registered until explicitly unregistered.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{DeviceEntry, SyncConfig};
use crate::device::{Capabilities, Device, DeviceStatus, DeviceType};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown device type '{0}' (valid: projector, tablet, staticDisplay)")]
    UnknownDeviceType(String),

    #[error("device id must not be empty")]
    EmptyDeviceId,

    #[error("device '{device}' reports a refresh rate of 0 Hz")]
    ZeroRefreshRate { device: String },

    #[error("device '{0}' is not registered")]
    NotFound(String),
}

// ── Request / result ──────────────────────────────────────────────────────────

/// Registration input, as received from config or the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub device_id: String,
    /// Kept as text so unknown kinds are rejected with a reason.
    pub device_type: String,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl RegisterRequest {
    pub fn from_entry(device_id: &str, entry: &DeviceEntry) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_type: entry.device_type.clone(),
            capabilities: Capabilities {
                refresh_rate: entry.refresh_rate,
                resolution: entry.resolution.clone(),
                sync_priority: entry.sync_priority,
                display_modes: entry.display_modes.clone(),
            },
            is_primary: entry.primary,
            endpoint: entry.endpoint.clone(),
        }
    }
}

/// Accepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub device: Device,
    pub sync_interval: Duration,
    /// `true` if the id was already known and only its capabilities changed.
    pub reregistered: bool,
}

/// Selection for [`DeviceRegistry::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
    pub primary_only: bool,
}

impl DeviceFilter {
    fn matches(&self, d: &Device) -> bool {
        self.device_type.map_or(true, |t| d.device_type == t)
            && self.status.map_or(true, |s| d.status == s)
            && (!self.primary_only || d.is_primary)
    }
}

/// Sync outcome published by a device's sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPublish {
    pub status: DeviceStatus,
    /// Set only for successful syncs.
    pub latency_ms: Option<u64>,
    pub at_ms: u64,
}

// ── DeviceRegistry ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct DeviceRegistry {
    /// `BTreeMap` so listings come out in id order.
    devices: RwLock<BTreeMap<String, Device>>,
    sync: SyncConfig,
}

impl DeviceRegistry {
    pub fn new(sync: SyncConfig) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            sync,
        }
    }

    /// Register or re-register a device.
    ///
    /// Re-registering a known id replaces its type, capabilities, primary
    /// flag and endpoint, and resets its status to `syncing`.
    ///
    /// # Errors
    /// [`RegistryError`] describing why the request was rejected.
    pub fn register(&self, req: RegisterRequest, now_ms: u64) -> Result<Registration, RegistryError> {
        if req.device_id.trim().is_empty() {
            return Err(RegistryError::EmptyDeviceId);
        }
        let device_type: DeviceType = req.device_type.parse().map_err(|e| {
            warn!(device = %req.device_id, device_type = %req.device_type, "registration rejected");
            e
        })?;
        if req.capabilities.refresh_rate == 0 {
            return Err(RegistryError::ZeroRefreshRate {
                device: req.device_id,
            });
        }

        let sync_interval = self.sync.interval_for(req.capabilities.refresh_rate);
        let mut devices = self.devices.write();
        let reregistered = devices.contains_key(&req.device_id);
        let registered_at = devices
            .get(&req.device_id)
            .map_or(now_ms, |d| d.registered_at);

        let device = Device {
            device_id: req.device_id.clone(),
            device_type,
            capabilities: req.capabilities,
            is_primary: req.is_primary,
            endpoint: req.endpoint,
            status: DeviceStatus::Syncing,
            last_ping: None,
            latency_ms: None,
            registered_at,
        };
        devices.insert(req.device_id, device.clone());

        info!(
            device = %device.device_id,
            device_type = %device.device_type,
            refresh_hz = device.capabilities.refresh_rate,
            primary = device.is_primary,
            interval_ms = sync_interval.as_millis() as u64,
            reregistered,
            "device registered"
        );

        Ok(Registration {
            device,
            sync_interval,
            reregistered,
        })
    }

    /// Remove a device for good.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] if the id is unknown.
    pub fn unregister(&self, device_id: &str) -> Result<Device, RegistryError> {
        let removed = self
            .devices
            .write()
            .remove(device_id)
            .ok_or_else(|| RegistryError::NotFound(device_id.to_string()))?;
        info!(device = %device_id, "device unregistered");
        Ok(removed)
    }

    pub fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().get(device_id).cloned()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.read().contains_key(device_id)
    }

    pub fn list(&self, filter: &DeviceFilter) -> Vec<Device> {
        self.devices
            .read()
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Sync interval assigned to `device_id` from its refresh rate.
    pub fn sync_interval(&self, device_id: &str) -> Option<Duration> {
        self.devices
            .read()
            .get(device_id)
            .map(|d| self.sync.interval_for(d.capabilities.refresh_rate))
    }

    /// Publish the result of one sync cycle.  Only the device's sync task
    /// calls this.
    ///
    /// Returns the previous status, or `None` if the device was unregistered
    /// in the meantime (the update is dropped).
    pub fn publish_sync(&self, device_id: &str, update: SyncPublish) -> Option<DeviceStatus> {
        let mut devices = self.devices.write();
        let device = devices.get_mut(device_id)?;
        let previous = device.status;
        device.status = update.status;
        if let Some(latency) = update.latency_ms {
            device.latency_ms = Some(latency);
            device.last_ping = Some(update.at_ms);
        }
        Some(previous)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
