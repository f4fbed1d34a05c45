/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Transport seam between the coordinator and display devices.
//!
//! The coordinator only knows [`DisplayLink`]; production uses
//! [`TcpDisplayLink`], tests script latency and failures in memory.

pub mod tcp;

#[cfg(test)]
pub(crate) mod scripted;

pub use tcp::TcpDisplayLink;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::device::Device;
use crate::wire::{DeviceAck, SlotState};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("device '{0}' has no endpoint configured")]
    NoEndpoint(String),

    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("device closed the connection before acknowledging")]
    Closed,

    #[error("ack is for block {got_block} slot {got_slot}, pushed block {block} slot {slot}")]
    AckMismatch {
        block: u32,
        slot: u32,
        got_block: u32,
        got_slot: u32,
    },

    #[error("no ack within {0:?}")]
    Timeout(Duration),

    #[error("device '{0}' is unreachable")]
    Unreachable(String),
}

/// Pushes slot state to one device and waits for its acknowledgement.
///
/// Implementations must be cancel-safe: the coordinator drops the future
/// when the push timeout expires.
#[async_trait]
pub trait DisplayLink: Send + Sync {
    async fn push(&self, device: &Device, state: &SlotState) -> Result<DeviceAck, LinkError>;

    /// Drop any per-device transport state (called on unregister).
    fn release(&self, _device_id: &str) {}
}

/// Reject acks that answer a different push.
pub(crate) fn check_ack(state: &SlotState, ack: DeviceAck) -> Result<DeviceAck, LinkError> {
    if ack.block_number != state.block_number || ack.slot_number != state.slot_number {
        return Err(LinkError::AckMismatch {
            block: state.block_number,
            slot: state.slot_number,
            got_block: ack.block_number,
            got_slot: ack.slot_number,
        });
    }
    Ok(ack)
}
