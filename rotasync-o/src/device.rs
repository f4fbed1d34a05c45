/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Display device data structures.
//!
//! One generic [`Device`] covers every display kind; what differs between a
//! projector and a tablet is captured by [`Capabilities`], never by a
//! device-specific type.  Rendering stays entirely on the device side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

// ── Device type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    Projector,
    /// Tablet used as a mobile billboard.
    Tablet,
    /// Static outdoor display.
    StaticDisplay,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Projector => "projector",
            DeviceType::Tablet => "tablet",
            DeviceType::StaticDisplay => "staticDisplay",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = RegistryError;

    /// Accepts the wire spelling (`staticDisplay`) and the YAML-friendly
    /// snake case (`static_display`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projector" => Ok(DeviceType::Projector),
            "tablet" => Ok(DeviceType::Tablet),
            "staticDisplay" | "static_display" => Ok(DeviceType::StaticDisplay),
            other => Err(RegistryError::UnknownDeviceType(other.to_string())),
        }
    }
}

// ── Device status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceStatus {
    /// Last sync succeeded.
    Online,
    /// Registered or recovering; waiting for a confirmed sync.
    Syncing,
    /// Too many consecutive failures; still registered.
    Offline,
    /// Last sync failed.
    Error,
}

// ── Capabilities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Display refresh rate in Hz; drives the sync interval.
    pub refresh_rate: u32,
    #[serde(default)]
    pub resolution: String,
    /// Higher syncs first when several devices are due together.
    #[serde(default)]
    pub sync_priority: u8,
    #[serde(default)]
    pub display_modes: Vec<String>,
}

// ── Device ────────────────────────────────────────────────────────────────────

/// A registered display and its last published sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub device_type: DeviceType,
    pub capabilities: Capabilities,
    /// Audio/trigger priority hint; projectors usually set it.
    pub is_primary: bool,
    /// `host:port` of the device's sync listener.
    pub endpoint: Option<String>,
    pub status: DeviceStatus,
    /// Time of the last successful sync, UTC epoch ms.
    pub last_ping: Option<u64>,
    /// Round trip of the last successful sync.
    pub latency_ms: Option<u64>,
    pub registered_at: u64,
}
