/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Configuration validation errors.
//!
//! Every variant is fatal at startup: the daemon refuses to run with a
//! schedule that cannot tile the day or a sync policy with zero-valued knobs.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `schedule.slot_duration_secs` is zero.
    #[error("slot duration must be greater than zero")]
    ZeroSlotDuration,

    /// Only 24-slot blocks are supported.
    #[error("slots_per_block must be {expected}, got {got}")]
    SlotsPerBlock { expected: u32, got: u32 },

    /// `slot_duration × slots_per_block` does not divide 24 h evenly, so
    /// blocks would straddle midnight.
    #[error("block length {block_secs}s does not evenly divide a 24h day")]
    BlockLengthDoesNotTileDay { block_secs: u64 },

    /// The blocks in one day do not form whole 1..=6 numbering cycles.
    #[error("{blocks_per_day} blocks per day is not a multiple of the {cycle}-block cycle")]
    PartialBlockCycle { blocks_per_day: u64, cycle: u32 },

    /// A `slots:` catalog entry names a slot outside `1..=slots_per_block`.
    #[error("slot {slot} is outside 1..={max}")]
    SlotOutOfRange { slot: u32, max: u32 },

    /// A numeric knob that must be positive is zero.
    #[error("configuration value '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
}
