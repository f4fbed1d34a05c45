/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Rotasync-O – slot/block rotation scheduler and multi-device sync
//! coordinator
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── clock          – time source (system / manual)
//! ├── config/        – YAML rotation configuration + validation
//! ├── slot           – Slot / Block data structures
//! ├── catalog        – static per-slot definitions, sponsors
//! ├── layers         – render layer settings (read-only for renderers)
//! ├── schedule/      – timetable math + BlockScheduler state machine
//! ├── event_log      – append-only sync / transition log
//! ├── device         – Device, capabilities, status
//! ├── registry       – DeviceRegistry
//! ├── health         – HealthMonitor (hysteresis)
//! ├── wire           – JSON-lines messages to display nodes
//! ├── link/          – DisplayLink transport (TCP)
//! ├── sync/          – SyncCoordinator, one lane per device
//! ├── control        – operator control endpoint
//! └── service        – RotationService runtime wiring
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod control;
pub mod device;
pub mod event_log;
pub mod health;
pub mod layers;
pub mod link;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod slot;
pub mod sync;
pub mod wire;
