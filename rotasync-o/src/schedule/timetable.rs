/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure time → (block, slot) arithmetic.
//!
//! Nothing here holds state beyond the validated durations, so any number of
//! tasks or processes that agree on the clock and the configuration compute
//! the same position without talking to each other.

use crate::config::{ConfigError, ScheduleConfig, BLOCK_CYCLE, SECONDS_PER_DAY};

const MS_PER_DAY: u64 = SECONDS_PER_DAY * 1_000;

/// Where a timestamp falls in the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPosition {
    /// Midnight UTC of the day containing the timestamp.
    pub day_start_ms: u64,
    /// 0-based block index within the day.
    pub block_of_day: u64,
    /// Cyclic block number `1..=6`.
    pub block_number: u32,
    pub block_start_ms: u64,
    pub block_end_ms: u64,
    /// 0-based slot index within the block.
    pub slot_index: u32,
    pub slot_start_ms: u64,
    pub slot_end_ms: u64,
}

impl SlotPosition {
    /// 1-based slot number.
    pub fn slot_number(&self) -> u32 {
        self.slot_index + 1
    }

    /// Two positions are in the same block iff their block starts match.
    pub fn same_block(&self, other: &SlotPosition) -> bool {
        self.block_start_ms == other.block_start_ms
    }
}

/// Validated slot/block durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timetable {
    slot_ms: u64,
    slots_per_block: u32,
    block_ms: u64,
}

impl Timetable {
    /// # Errors
    /// The [`ConfigError`] from [`ScheduleConfig::validate`].
    pub fn new(cfg: &ScheduleConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            slot_ms: cfg.slot_duration_secs * 1_000,
            slots_per_block: cfg.slots_per_block,
            block_ms: cfg.block_length_secs() * 1_000,
        })
    }

    pub fn slot_ms(&self) -> u64 {
        self.slot_ms
    }

    pub fn block_ms(&self) -> u64 {
        self.block_ms
    }

    pub fn slots_per_block(&self) -> u32 {
        self.slots_per_block
    }

    pub fn blocks_per_day(&self) -> u64 {
        MS_PER_DAY / self.block_ms
    }

    /// Locate `now_ms` in the rotation.
    ///
    /// `block = floor(since_midnight / block_len) mod 6`,
    /// `slot  = floor(since_block_start / slot_len) mod 24`.
    pub fn locate(&self, now_ms: u64) -> SlotPosition {
        let day_start_ms = now_ms - now_ms % MS_PER_DAY;
        let since_midnight = now_ms - day_start_ms;

        let block_of_day = since_midnight / self.block_ms;
        let block_number = (block_of_day % u64::from(BLOCK_CYCLE)) as u32 + 1;
        let block_start_ms = day_start_ms + block_of_day * self.block_ms;

        let since_block = now_ms - block_start_ms;
        let slot_index = ((since_block / self.slot_ms) % u64::from(self.slots_per_block)) as u32;
        let slot_start_ms = block_start_ms + u64::from(slot_index) * self.slot_ms;

        SlotPosition {
            day_start_ms,
            block_of_day,
            block_number,
            block_start_ms,
            block_end_ms: block_start_ms + self.block_ms,
            slot_index,
            slot_start_ms,
            slot_end_ms: slot_start_ms + self.slot_ms,
        }
    }

    /// Start time of slot `index` in the block starting at `block_start_ms`.
    pub fn slot_start(&self, block_start_ms: u64, index: u32) -> u64 {
        block_start_ms + u64::from(index) * self.slot_ms
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
