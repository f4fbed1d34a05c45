/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core slot and block data structures.
//!
//! ```text
//! day ──► 6 blocks (cyclic numbering 1..=6) ──► 24 slots per block
//!                 ↑ Block                              ↑ Slot
//!                 status derived from time             status derived from time + overrides
//! ```
//!
//! # Ownership model
//! `Block` and `Slot` values are **snapshots**.  [`BlockScheduler`] rebuilds
//! them on every query from the timetable and its small override table, so no
//! caller ever holds a mutable slot.  Slot identity is block-relative: slot 7
//! of one block has nothing to do with slot 7 of the next.
//!
//! [`BlockScheduler`]: crate::schedule::BlockScheduler

use serde::{Deserialize, Serialize};

// ── Slot type ─────────────────────────────────────────────────────────────────

/// Commercial category of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotType {
    /// Regular rotating advertising slot.
    #[default]
    Standard,
    /// Reserved for the main sponsor of the installation.
    MainSponsor,
    /// Slot whose content is decided by a live auction.
    LiveBidding,
}

impl SlotType {
    /// Priority used when the catalog entry does not set one explicitly.
    pub fn default_priority(self) -> u8 {
        match self {
            SlotType::Standard => 1,
            SlotType::LiveBidding => 5,
            SlotType::MainSponsor => 10,
        }
    }
}

// ── Slot status ───────────────────────────────────────────────────────────────

/// Lifecycle of one slot within one block.
///
/// ```text
/// scheduled ──(time reached)──► active ──(duration elapsed)──► completed
///                                 ├──(manual skip)──────────► skipped
///                                 └──(render failure)───────► error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotStatus {
    Scheduled,
    Active,
    Completed,
    Error,
    Skipped,
}

impl SlotStatus {
    /// `true` for the three end states a slot can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SlotStatus::Completed | SlotStatus::Error | SlotStatus::Skipped
        )
    }

    /// Returns `true` if moving from `self` to `next` is a legal forward step
    /// (or no change at all).
    pub fn can_transition_to(self, next: SlotStatus) -> bool {
        use SlotStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Scheduled, Active) | (Active, Completed) | (Active, Error) | (Active, Skipped)
        )
    }
}

// ── Block status ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockStatus {
    Scheduled,
    Active,
    Completed,
    /// Operator hold: time keeps running, devices keep the current slot.
    Paused,
}

// ── Slot ──────────────────────────────────────────────────────────────────────

/// One timed display interval within a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// 1-based position within the block (`1..=24`).
    pub slot_number: u32,
    pub slot_type: SlotType,
    /// Nominal length of the slot in seconds.
    pub duration: u64,
    pub sponsor_id: Option<String>,
    pub priority: u8,
    pub status: SlotStatus,
    /// Scheduled start, UTC epoch ms.
    pub start_time: u64,
    /// Scheduled end (exclusive), UTC epoch ms.
    pub end_time: u64,
}

impl Slot {
    /// `true` while this slot is the one on screen (an errored slot still
    /// holds its time window).
    pub fn is_current(&self) -> bool {
        matches!(self.status, SlotStatus::Active | SlotStatus::Error)
    }
}

// ── Block ─────────────────────────────────────────────────────────────────────

/// A repeating scheduling window holding the ordered slot sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Cyclic block number `1..=6`.
    pub block_number: u32,
    /// UTC epoch ms.
    pub start_time: u64,
    /// UTC epoch ms (exclusive).
    pub end_time: u64,
    pub slots: Vec<Slot>,
    pub status: BlockStatus,
}

impl Block {
    /// The slot currently on screen, if any.
    pub fn current_slot(&self) -> Option<&Slot> {
        self.slots.iter().find(|s| s.is_current())
    }

    /// Number of slots in `status`.
    pub fn count_status(&self, status: SlotStatus) -> usize {
        self.slots.iter().filter(|s| s.status == status).count()
    }

    /// Block length in milliseconds.
    pub fn length_ms(&self) -> u64 {
        self.end_time - self.start_time
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
