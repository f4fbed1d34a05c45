/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Errors for operator and device reports against the block scheduler.
//!
//! None of these stop rotation: the scheduler keeps following the clock and
//! the caller decides whether to surface the rejection.

use thiserror::Error;

use crate::slot::SlotStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A report named a slot that is not the one currently on screen.
    #[error("slot {slot} is not the current slot (current: {current})")]
    NotCurrentSlot { slot: u32, current: u32 },

    /// The current slot already left `active` (e.g. it errored).
    #[error("slot {slot} is {status:?}, only an active slot can change")]
    NotActive { slot: u32, status: SlotStatus },

    /// The last slot has no successor inside the block to advance to.
    #[error("slot {slot} is the last slot of the block and cannot be skipped")]
    LastSlotOfBlock { slot: u32 },

    #[error("slot {0} does not exist")]
    UnknownSlot(u32),
}
