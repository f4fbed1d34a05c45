/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Rotation configuration loading and validation.
//!
//! The expected YAML structure is (every section optional):
//! ```yaml
//! schedule:
//!   slot_duration_secs: 600
//!   slots_per_block: 24
//! sync:
//!   base_interval_ms: 1000
//!   reference_refresh_hz: 30
//!   min_interval_ms: 100
//!   push_timeout_ms: 5000
//! health:
//!   latency_threshold_ms: 25
//!   critical_after_failures: 3
//!   recovery_successes: 2
//!   window_secs: 60
//! event_log:
//!   capacity: 10000
//! slots:
//!   1: { type: mainSponsor, sponsor: "acme" }
//! layers:
//!   hologram: { enabled: false }
//! devices:
//!   beamer01:
//!     type: projector
//!     refresh_rate: 60
//!     resolution: "1920x1080"
//!     sync_priority: 10
//!     primary: true
//!     endpoint: "127.0.0.1:7101"
//! ```

pub mod error;

pub use error::ConfigError;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::layers::LayerConfig;
use crate::slot::SlotType;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Slots per block.  Fixed; configs naming another value are rejected.
pub const SLOTS_PER_BLOCK: u32 = 24;

/// Block numbers run `1..=BLOCK_CYCLE` and then wrap.
pub const BLOCK_CYCLE: u32 = 6;

// ── Schedule ──────────────────────────────────────────────────────────────────

/// Slot timing.  Block length is duration-driven:
/// `slot_duration_secs × slots_per_block`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub slot_duration_secs: u64,
    pub slots_per_block: u32,
}

impl Default for ScheduleConfig {
    /// 24 × 600 s = exactly 4 h per block, 6 blocks per day.
    fn default() -> Self {
        Self {
            slot_duration_secs: 600,
            slots_per_block: SLOTS_PER_BLOCK,
        }
    }
}

impl ScheduleConfig {
    pub fn with_slot_duration(slot_duration_secs: u64) -> Self {
        Self {
            slot_duration_secs,
            ..Self::default()
        }
    }

    pub fn block_length_secs(&self) -> u64 {
        self.slot_duration_secs
            .saturating_mul(u64::from(self.slots_per_block))
    }

    /// # Errors
    /// Any [`ConfigError`] describing why the slots cannot tile the day.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_duration_secs == 0 {
            return Err(ConfigError::ZeroSlotDuration);
        }
        if self.slots_per_block != SLOTS_PER_BLOCK {
            return Err(ConfigError::SlotsPerBlock {
                expected: SLOTS_PER_BLOCK,
                got: self.slots_per_block,
            });
        }
        let block_secs = self.block_length_secs();
        if block_secs > SECONDS_PER_DAY || SECONDS_PER_DAY % block_secs != 0 {
            return Err(ConfigError::BlockLengthDoesNotTileDay { block_secs });
        }
        let blocks_per_day = SECONDS_PER_DAY / block_secs;
        if blocks_per_day % u64::from(BLOCK_CYCLE) != 0 {
            return Err(ConfigError::PartialBlockCycle {
                blocks_per_day,
                cycle: BLOCK_CYCLE,
            });
        }
        Ok(())
    }
}

// ── Sync ──────────────────────────────────────────────────────────────────────

/// Sync cycle timing policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync interval for a device refreshing at `reference_refresh_hz`.
    pub base_interval_ms: u64,
    pub reference_refresh_hz: u32,
    /// Floor for very fast displays.
    pub min_interval_ms: u64,
    /// A push not acknowledged within this time counts as failed.
    pub push_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1_000,
            reference_refresh_hz: 30,
            min_interval_ms: 100,
            push_timeout_ms: 5_000,
        }
    }
}

impl SyncConfig {
    /// Sync interval for a device refreshing at `refresh_hz`.
    ///
    /// Inversely proportional to the refresh rate: doubling the refresh rate
    /// halves the interval, down to `min_interval_ms`.
    pub fn interval_for(&self, refresh_hz: u32) -> Duration {
        if refresh_hz == 0 {
            return Duration::from_millis(self.base_interval_ms);
        }
        let ms = self.base_interval_ms * u64::from(self.reference_refresh_hz)
            / u64::from(refresh_hz);
        Duration::from_millis(ms.max(self.min_interval_ms))
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval_ms == 0 {
            return Err(ConfigError::ZeroValue {
                field: "sync.base_interval_ms",
            });
        }
        if self.reference_refresh_hz == 0 {
            return Err(ConfigError::ZeroValue {
                field: "sync.reference_refresh_hz",
            });
        }
        if self.push_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue {
                field: "sync.push_timeout_ms",
            });
        }
        Ok(())
    }
}

// ── Health ────────────────────────────────────────────────────────────────────

/// Health classification thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Round trips slower than this mark the device degraded.
    pub latency_threshold_ms: u64,
    /// Consecutive failures before a device is critical (and offline).
    pub critical_after_failures: u32,
    /// Consecutive good syncs required to return to healthy.
    pub recovery_successes: u32,
    /// Rolling window for the system success rate.
    pub window_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 25,
            critical_after_failures: 3,
            recovery_successes: 2,
            window_secs: 60,
        }
    }
}

impl HealthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.critical_after_failures == 0 {
            return Err(ConfigError::ZeroValue {
                field: "health.critical_after_failures",
            });
        }
        if self.recovery_successes == 0 {
            return Err(ConfigError::ZeroValue {
                field: "health.recovery_successes",
            });
        }
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "health.window_secs",
            });
        }
        Ok(())
    }
}

// ── Event log ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Events retained in memory; older ones are dropped first.
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

// ── Catalog and device entries ────────────────────────────────────────────────

/// One `slots:` entry.  Unlisted slots are `standard` with no sponsor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotEntry {
    #[serde(rename = "type", default)]
    pub slot_type: SlotType,
    pub sponsor: Option<String>,
    pub priority: Option<u8>,
}

/// One `devices:` entry, registered at startup.
///
/// `type` is kept as a string so an unknown kind is rejected by the
/// registry (and logged) rather than failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    #[serde(rename = "type")]
    pub device_type: String,
    pub refresh_rate: u32,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub sync_priority: u8,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub display_modes: Vec<String>,
    pub endpoint: Option<String>,
}

// ── RotationConfig ────────────────────────────────────────────────────────────

/// The complete configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub schedule: ScheduleConfig,
    pub sync: SyncConfig,
    pub health: HealthConfig,
    pub event_log: EventLogConfig,
    pub slots: BTreeMap<u32, SlotEntry>,
    pub layers: LayerConfig,
    pub devices: BTreeMap<String, DeviceEntry>,
}

impl RotationConfig {
    /// Validate every section.
    ///
    /// # Errors
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.validate()?;
        self.sync.validate()?;
        self.health.validate()?;
        if self.event_log.capacity == 0 {
            return Err(ConfigError::ZeroValue {
                field: "event_log.capacity",
            });
        }
        let max = self.schedule.slots_per_block;
        if let Some(&slot) = self.slots.keys().find(|&&n| n == 0 || n > max) {
            return Err(ConfigError::SlotOutOfRange { slot, max });
        }
        Ok(())
    }
}

// ── ConfigManager ─────────────────────────────────────────────────────────────

/// Loads and holds the rotation configuration.
#[derive(Debug, Default)]
pub struct ConfigManager {
    config: RotationConfig,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl ConfigManager {
    /// Creates a manager holding the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates `path`, replacing the current configuration.
    ///
    /// On error the previous configuration is discarded and the manager
    /// reports not loaded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or validation fails (wrapping a [`ConfigError`]).
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading rotation configuration from: {}", path.display());

        self.config = RotationConfig::default();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let config: RotationConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        if config.devices.is_empty() {
            warn!("No devices in configuration file; devices must register at runtime");
        }

        info!(
            slot_duration_secs = config.schedule.slot_duration_secs,
            block_length_secs = config.schedule.block_length_secs(),
            devices = config.devices.len(),
            catalog_entries = config.slots.len(),
            "Configuration loaded"
        );
        for (id, dev) in &config.devices {
            debug!(
                "  Device: {} | type: {} | refresh: {}Hz | primary: {}",
                id, dev.device_type, dev.refresh_rate, dev.primary
            );
        }

        self.config = config;
        self.loaded = true;
        Ok(())
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Consumes the manager, handing out the configuration.
    pub fn into_config(self) -> RotationConfig {
        self.config
    }

    /// Returns `true` after a successful [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── ScheduleConfig ────────────────────────────────────────────────────────

    #[test]
    fn six_hundred_second_slots_give_four_hour_blocks() {
        let cfg = ScheduleConfig::with_slot_duration(600);
        cfg.validate().unwrap();
        assert_eq!(cfg.block_length_secs(), 14_400);
    }

    #[test]
    fn twenty_second_slots_give_eight_minute_blocks() {
        let cfg = ScheduleConfig::with_slot_duration(20);
        cfg.validate().unwrap();
        assert_eq!(cfg.block_length_secs(), 480);
    }

    #[test]
    fn every_rotation_duration_that_tiles_the_day_is_accepted() {
        for secs in [15, 20, 24, 25, 30] {
            ScheduleConfig::with_slot_duration(secs)
                .validate()
                .unwrap_or_else(|e| panic!("{secs}s rejected: {e}"));
        }
    }

    #[test]
    fn zero_slot_duration_is_rejected() {
        assert_eq!(
            ScheduleConfig::with_slot_duration(0).validate(),
            Err(ConfigError::ZeroSlotDuration)
        );
    }

    #[test]
    fn block_not_dividing_day_is_rejected() {
        // 24 × 17 s = 408 s; 86400 / 408 is not whole
        assert_eq!(
            ScheduleConfig::with_slot_duration(17).validate(),
            Err(ConfigError::BlockLengthDoesNotTileDay { block_secs: 408 })
        );
    }

    #[test]
    fn block_longer_than_a_day_is_rejected() {
        let err = ScheduleConfig::with_slot_duration(7_200).validate().unwrap_err();
        assert!(matches!(err, ConfigError::BlockLengthDoesNotTileDay { .. }));
    }

    #[test]
    fn partial_block_cycle_is_rejected() {
        // 24 × 1800 s = 12 h → 2 blocks per day, not a multiple of 6
        assert_eq!(
            ScheduleConfig::with_slot_duration(1_800).validate(),
            Err(ConfigError::PartialBlockCycle {
                blocks_per_day: 2,
                cycle: BLOCK_CYCLE
            })
        );
    }

    #[test]
    fn slots_per_block_other_than_24_is_rejected() {
        let cfg = ScheduleConfig {
            slot_duration_secs: 600,
            slots_per_block: 12,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SlotsPerBlock { got: 12, .. })
        ));
    }

    // ── SyncConfig ────────────────────────────────────────────────────────────

    #[test]
    fn sync_interval_is_inversely_proportional_to_refresh_rate() {
        let cfg = SyncConfig::default();
        let at_30 = cfg.interval_for(30);
        let at_60 = cfg.interval_for(60);
        assert!(at_60 < at_30);
        assert_eq!(at_30, Duration::from_millis(1_000));
        assert_eq!(at_60, Duration::from_millis(500));
        assert_eq!(at_30.as_millis(), at_60.as_millis() * 2);
    }

    #[test]
    fn sync_interval_is_clamped_to_minimum() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.interval_for(10_000), Duration::from_millis(100));
    }

    // ── ConfigManager ─────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
schedule:
  slot_duration_secs: 20
sync:
  push_timeout_ms: 2000
health:
  latency_threshold_ms: 40
slots:
  1: { type: mainSponsor, sponsor: "acme" }
  24: { type: liveBidding, priority: 7 }
layers:
  hologram: { enabled: false }
devices:
  beamer01:
    type: projector
    refresh_rate: 60
    resolution: "1920x1080"
    sync_priority: 10
    primary: true
    endpoint: "127.0.0.1:7101"
  ipad01:
    type: tablet
    refresh_rate: 30
"#;
        let f = yaml_tempfile(yaml);
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();
        assert!(mgr.is_loaded());

        let cfg = mgr.config();
        assert_eq!(cfg.schedule.slot_duration_secs, 20);
        assert_eq!(cfg.schedule.slots_per_block, 24);
        assert_eq!(cfg.sync.push_timeout_ms, 2_000);
        assert_eq!(cfg.sync.base_interval_ms, 1_000); // default kept
        assert_eq!(cfg.health.latency_threshold_ms, 40);
        assert_eq!(cfg.slots[&1].slot_type, SlotType::MainSponsor);
        assert_eq!(cfg.slots[&1].sponsor.as_deref(), Some("acme"));
        assert_eq!(cfg.slots[&24].priority, Some(7));
        assert!(!cfg.layers.hologram.enabled);

        let beamer = &cfg.devices["beamer01"];
        assert_eq!(beamer.device_type, "projector");
        assert!(beamer.primary);
        assert_eq!(beamer.endpoint.as_deref(), Some("127.0.0.1:7101"));
        let ipad = &cfg.devices["ipad01"];
        assert!(!ipad.primary);
        assert_eq!(ipad.endpoint, None);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = yaml_tempfile("{}\n");
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();
        assert_eq!(mgr.config().schedule, ScheduleConfig::default());
        assert!(mgr.config().devices.is_empty());
    }

    #[test]
    fn invalid_schedule_fails_load() {
        let f = yaml_tempfile("schedule:\n  slot_duration_secs: 17\n");
        let mut mgr = ConfigManager::new();
        let err = mgr.load_from_file(f.path()).unwrap_err();
        assert!(!mgr.is_loaded());
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn catalog_entry_out_of_range_fails_load() {
        let f = yaml_tempfile("slots:\n  25: { type: standard }\n");
        let mut mgr = ConfigManager::new();
        let err = mgr.load_from_file(f.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::SlotOutOfRange { slot: 25, max: 24 })
        );
    }

    #[test]
    fn zero_push_timeout_fails_load() {
        let f = yaml_tempfile("sync:\n  push_timeout_ms: 0\n");
        let mut mgr = ConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = ConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/rotation.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        let mut mgr = ConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn bundled_demo_configuration_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/rotation.yaml");
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(&path).unwrap();
        let cfg = mgr.config();
        assert_eq!(cfg.schedule.block_length_secs(), 14_400);
        assert_eq!(cfg.devices.len(), 3);
        assert!(cfg.devices["beamer01"].primary);
        assert!(!cfg.layers.hologram.enabled);
    }
}
