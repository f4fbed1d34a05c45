/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Messages exchanged with display nodes, one JSON object per line.

use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleSnapshot;
use crate::slot::{SlotStatus, SlotType};

/// Coordinator → device: what to show right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub block_number: u32,
    pub slot_number: u32,
    pub slot_type: SlotType,
    pub slot_status: SlotStatus,
    pub sponsor_id: Option<String>,
    pub slot_start_time: u64,
    pub slot_end_time: u64,
    pub block_end_time: u64,
    pub paused: bool,
    /// Coordinator time when the state was taken, UTC epoch ms.
    pub timestamp: u64,
}

impl From<&ScheduleSnapshot> for SlotState {
    fn from(s: &ScheduleSnapshot) -> Self {
        Self {
            block_number: s.block_number,
            slot_number: s.slot.slot_number,
            slot_type: s.slot.slot_type,
            slot_status: s.slot.status,
            sponsor_id: s.slot.sponsor_id.clone(),
            slot_start_time: s.slot.start_time,
            slot_end_time: s.slot.end_time,
            block_end_time: s.block_end_time,
            paused: s.paused,
            timestamp: s.computed_at,
        }
    }
}

/// Device → coordinator: acknowledgement of one [`SlotState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAck {
    pub device_id: String,
    pub block_number: u32,
    pub slot_number: u32,
    /// The device could not render the pushed slot.
    #[serde(default)]
    pub render_failed: bool,
}

impl DeviceAck {
    pub fn for_state(device_id: impl Into<String>, state: &SlotState) -> Self {
        Self {
            device_id: device_id.into(),
            block_number: state.block_number,
            slot_number: state.slot_number,
            render_failed: false,
        }
    }
}
