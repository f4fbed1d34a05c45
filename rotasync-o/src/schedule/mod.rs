/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Block/slot rotation state machine.
//!
//! [`BlockScheduler`] answers "which block and slot are live at `now`?" as a
//! function of the clock plus a tiny per-block override table:
//!
//! ```text
//! now ──► Timetable::locate (pure) ──► SlotPosition
//!                                          │
//!              overrides (skip / error) ───┤
//!                                          ▼
//!                                  Block / Slot snapshot
//! ```
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | Rotation counters | None.  Position is derived from the clock on every call, so two schedulers on the same clock never drift |
//! | Shared state | Only skip/error overrides for the live block and the pause flag; both written on rare operator/device reports |
//! | Transition log | [`advance`](BlockScheduler::advance) compares the live position against the last one it saw and logs the difference; it is idempotent and may be called from any task |
//! | Publishing | Latest snapshot is pushed into a `watch` channel for renderers |
//!
//! Slot state machine:
//! `scheduled -(time reached)-> active -(duration elapsed)-> completed`,
//! `active -(manual skip)-> skipped`, `active -(render failure)-> error`.

pub mod error;
pub mod timetable;

pub use error::ScheduleError;
pub use timetable::{SlotPosition, Timetable};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, SlotCatalog};
use crate::event_log::{EventLog, NewEvent};
use crate::slot::{Block, BlockStatus, Slot, SlotStatus};

// ── Public value types ────────────────────────────────────────────────────────

/// One recorded slot status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub block_number: u32,
    pub slot_number: u32,
    pub from: SlotStatus,
    pub to: SlotStatus,
}

/// What renderers read: the live slot plus its block window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshot {
    pub block_number: u32,
    pub block_start_time: u64,
    pub block_end_time: u64,
    pub slot: Slot,
    pub paused: bool,
    /// When this snapshot was computed, UTC epoch ms.
    pub computed_at: u64,
}

// ── Internal state ────────────────────────────────────────────────────────────

/// Terminal statuses forced onto slots of the live block.
///
/// Keyed by block start: a table belonging to an older block is treated as
/// empty and cleared on first touch.
#[derive(Debug, Default)]
struct Overrides {
    block_start_ms: u64,
    statuses: BTreeMap<u32, SlotStatus>,
}

impl Overrides {
    fn for_block(&mut self, block_start_ms: u64) -> &mut BTreeMap<u32, SlotStatus> {
        if self.block_start_ms != block_start_ms {
            self.block_start_ms = block_start_ms;
            self.statuses.clear();
        }
        &mut self.statuses
    }

    fn view(&self, block_start_ms: u64) -> Option<&BTreeMap<u32, SlotStatus>> {
        (self.block_start_ms == block_start_ms).then_some(&self.statuses)
    }
}

/// Last position [`BlockScheduler::advance`] recorded.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    pos: SlotPosition,
    active_index: u32,
}

impl Cursor {
    /// Same block and same slot on screen, wherever the clock is inside it.
    fn same_slot(&self, other: &Cursor) -> bool {
        self.pos.same_block(&other.pos) && self.active_index == other.active_index
    }

    /// Strictly earlier on the timeline than `other`.
    fn precedes(&self, other: &Cursor) -> bool {
        (self.pos.block_start_ms, self.active_index) < (other.pos.block_start_ms, other.active_index)
    }
}

// ── BlockScheduler ────────────────────────────────────────────────────────────

pub struct BlockScheduler {
    timetable: Timetable,
    catalog: RwLock<SlotCatalog>,
    overrides: RwLock<Overrides>,
    paused: RwLock<bool>,
    cursor: Mutex<Option<Cursor>>,
    events: Arc<EventLog>,
    published: watch::Sender<Option<ScheduleSnapshot>>,
}

impl BlockScheduler {
    pub fn new(timetable: Timetable, catalog: SlotCatalog, events: Arc<EventLog>) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            timetable,
            catalog: RwLock::new(catalog),
            overrides: RwLock::new(Overrides::default()),
            paused: RwLock::new(false),
            cursor: Mutex::new(None),
            events,
            published,
        }
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    /// Pure position lookup; takes no locks.
    pub fn position(&self, now_ms: u64) -> SlotPosition {
        self.timetable.locate(now_ms)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// The live block with every slot's status at `now_ms`.
    pub fn current_block(&self, now_ms: u64) -> Block {
        let pos = self.position(now_ms);
        let overrides = self.overrides.read();
        let view = overrides.view(pos.block_start_ms);
        let active = self.active_index(&pos, view);
        let catalog = self.catalog.read();

        let slots = (0..self.timetable.slots_per_block())
            .map(|i| self.build_slot(&catalog, &pos, i, Self::status_of(i, active, view)))
            .collect();

        Block {
            block_number: pos.block_number,
            start_time: pos.block_start_ms,
            end_time: pos.block_end_ms,
            slots,
            status: self.block_status(),
        }
    }

    /// The slot on screen at `now_ms` (status `active`, or `error` if a
    /// device reported a render failure for it).
    pub fn current_slot(&self, now_ms: u64) -> Slot {
        let pos = self.position(now_ms);
        let overrides = self.overrides.read();
        let view = overrides.view(pos.block_start_ms);
        let active = self.active_index(&pos, view);
        let catalog = self.catalog.read();
        self.build_slot(&catalog, &pos, active, Self::status_of(active, active, view))
    }

    pub fn snapshot(&self, now_ms: u64) -> ScheduleSnapshot {
        let pos = self.position(now_ms);
        ScheduleSnapshot {
            block_number: pos.block_number,
            block_start_time: pos.block_start_ms,
            block_end_time: pos.block_end_ms,
            slot: self.current_slot(now_ms),
            paused: self.is_paused(),
            computed_at: now_ms,
        }
    }

    /// Receiver of the latest published snapshot (`None` until the first
    /// [`advance`](Self::advance)).
    pub fn subscribe(&self) -> watch::Receiver<Option<ScheduleSnapshot>> {
        self.published.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.read()
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    /// Record every transition between the last observed position and
    /// `now_ms`, append them to the event log and publish a fresh snapshot.
    ///
    /// Idempotent: calling it twice for the same slot records nothing new.
    pub fn advance(&self, now_ms: u64) -> Vec<Transition> {
        let transitions = {
            let mut cursor = self.cursor.lock();
            self.advance_locked(&mut cursor, now_ms)
        };
        if !transitions.is_empty() {
            self.publish(now_ms);
        }
        transitions
    }

    /// Operator override: close the active slot as `skipped` and bring the
    /// next slot on screen immediately.  The next slot keeps its normal end
    /// time, so the block boundary does not move.
    ///
    /// # Errors
    /// * [`ScheduleError::NotActive`] – the current slot already errored.
    /// * [`ScheduleError::LastSlotOfBlock`] – nothing left in this block.
    pub fn skip(&self, now_ms: u64) -> Result<Transition, ScheduleError> {
        let mut cursor = self.cursor.lock();
        // The slot being skipped must be recorded as active first.
        self.advance_locked(&mut cursor, now_ms);

        let pos = self.position(now_ms);
        let transition = {
            let mut overrides = self.overrides.write();
            let active = self.active_index(&pos, overrides.view(pos.block_start_ms));
            let statuses = overrides.for_block(pos.block_start_ms);
            if let Some(&status) = statuses.get(&active) {
                return Err(ScheduleError::NotActive {
                    slot: active + 1,
                    status,
                });
            }
            if active + 1 >= self.timetable.slots_per_block() {
                return Err(ScheduleError::LastSlotOfBlock { slot: active + 1 });
            }
            statuses.insert(active, SlotStatus::Skipped);
            Transition {
                block_number: pos.block_number,
                slot_number: active + 1,
                from: SlotStatus::Active,
                to: SlotStatus::Skipped,
            }
        };

        warn!(
            block = transition.block_number,
            slot = transition.slot_number,
            "slot skipped by operator"
        );
        self.record(now_ms, &transition);
        self.advance_locked(&mut cursor, now_ms);
        drop(cursor);

        self.publish(now_ms);
        Ok(transition)
    }

    /// A device failed to render `slot_number`.  Marks the slot `error`;
    /// rotation is not affected.
    ///
    /// Returns `Ok(None)` if the slot was already marked.
    ///
    /// # Errors
    /// [`ScheduleError::NotCurrentSlot`] if `slot_number` is not on screen,
    /// [`ScheduleError::NotActive`] if it was skipped.
    pub fn report_render_failure(
        &self,
        now_ms: u64,
        slot_number: u32,
    ) -> Result<Option<Transition>, ScheduleError> {
        if slot_number == 0 || slot_number > self.timetable.slots_per_block() {
            return Err(ScheduleError::UnknownSlot(slot_number));
        }
        let mut cursor = self.cursor.lock();
        self.advance_locked(&mut cursor, now_ms);

        let pos = self.position(now_ms);
        let transition = {
            let mut overrides = self.overrides.write();
            let active = self.active_index(&pos, overrides.view(pos.block_start_ms));
            if slot_number != active + 1 {
                return Err(ScheduleError::NotCurrentSlot {
                    slot: slot_number,
                    current: active + 1,
                });
            }
            let statuses = overrides.for_block(pos.block_start_ms);
            match statuses.get(&active) {
                Some(SlotStatus::Error) => return Ok(None),
                Some(&status) => {
                    return Err(ScheduleError::NotActive {
                        slot: slot_number,
                        status,
                    })
                }
                None => {}
            }
            statuses.insert(active, SlotStatus::Error);
            Transition {
                block_number: pos.block_number,
                slot_number,
                from: SlotStatus::Active,
                to: SlotStatus::Error,
            }
        };

        warn!(
            block = transition.block_number,
            slot = transition.slot_number,
            "render failure reported, slot marked error"
        );
        self.record(now_ms, &transition);
        drop(cursor);

        self.publish(now_ms);
        Ok(Some(transition))
    }

    /// Hold the current block: devices keep showing what they show.
    pub fn pause(&self, now_ms: u64) {
        *self.paused.write() = true;
        info!("rotation paused");
        self.publish(now_ms);
    }

    pub fn resume(&self, now_ms: u64) {
        *self.paused.write() = false;
        info!("rotation resumed");
        self.publish(now_ms);
    }

    // ── Catalog passthrough ───────────────────────────────────────────────────

    pub fn assign_sponsor(
        &self,
        slot_number: u32,
        sponsor_id: impl Into<String>,
    ) -> Result<(), CatalogError> {
        self.catalog.write().assign_sponsor(slot_number, sponsor_id)
    }

    pub fn catalog(&self) -> SlotCatalog {
        self.catalog.read().clone()
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Body of [`advance`](Self::advance).  Runs under the cursor lock so
    /// transition events reach the log in the order they happened, before
    /// any sync that reflects them.
    fn advance_locked(&self, cursor: &mut Option<Cursor>, now_ms: u64) -> Vec<Transition> {
        let pos = self.position(now_ms);
        let active_index = {
            let overrides = self.overrides.read();
            self.active_index(&pos, overrides.view(pos.block_start_ms))
        };
        let next = Cursor { pos, active_index };

        // A caller holding an older timestamp must not walk the cursor back.
        if cursor.map_or(false, |prev| prev.same_slot(&next) || next.precedes(&prev)) {
            return Vec::new();
        }

        let mut transitions = Vec::new();
        if let Some(prev) = *cursor {
            // The previous slot completes unless a skip/error already closed it.
            let closed_by_override = self
                .overrides
                .read()
                .view(prev.pos.block_start_ms)
                .and_then(|v| v.get(&prev.active_index))
                .is_some();
            if !closed_by_override {
                transitions.push(Transition {
                    block_number: prev.pos.block_number,
                    slot_number: prev.active_index + 1,
                    from: SlotStatus::Active,
                    to: SlotStatus::Completed,
                });
            }
            if !prev.pos.same_block(&pos) {
                info!(
                    block = prev.pos.block_number,
                    block_of_day = prev.pos.block_of_day,
                    "block completed"
                );
            }
        }
        if cursor.map_or(true, |prev| !prev.pos.same_block(&pos)) {
            info!(
                block = pos.block_number,
                block_of_day = pos.block_of_day,
                start_ms = pos.block_start_ms,
                end_ms = pos.block_end_ms,
                "block started"
            );
        }
        transitions.push(Transition {
            block_number: pos.block_number,
            slot_number: active_index + 1,
            from: SlotStatus::Scheduled,
            to: SlotStatus::Active,
        });
        *cursor = Some(next);

        for t in &transitions {
            self.record(now_ms, t);
        }
        info!(block = pos.block_number, slot = active_index + 1, "slot active");
        transitions
    }

    fn record(&self, now_ms: u64, t: &Transition) {
        self.events
            .append(now_ms, NewEvent::scheduler(t.block_number, t.slot_number, t.to));
        debug!(
            block = t.block_number,
            slot = t.slot_number,
            from = ?t.from,
            to = ?t.to,
            "slot transition"
        );
    }

    /// Index of the slot on screen: the clock's slot, moved past any slots
    /// skipped early.
    fn active_index(&self, pos: &SlotPosition, view: Option<&BTreeMap<u32, SlotStatus>>) -> u32 {
        let mut idx = pos.slot_index;
        if let Some(statuses) = view {
            let last = self.timetable.slots_per_block() - 1;
            while idx < last && statuses.get(&idx) == Some(&SlotStatus::Skipped) {
                idx += 1;
            }
        }
        idx
    }

    fn status_of(index: u32, active: u32, view: Option<&BTreeMap<u32, SlotStatus>>) -> SlotStatus {
        if let Some(&forced) = view.and_then(|v| v.get(&index)) {
            return forced;
        }
        match index.cmp(&active) {
            std::cmp::Ordering::Less => SlotStatus::Completed,
            std::cmp::Ordering::Equal => SlotStatus::Active,
            std::cmp::Ordering::Greater => SlotStatus::Scheduled,
        }
    }

    fn build_slot(
        &self,
        catalog: &SlotCatalog,
        pos: &SlotPosition,
        index: u32,
        status: SlotStatus,
    ) -> Slot {
        let slot_number = index + 1;
        let def = catalog.definition(slot_number).cloned().unwrap_or_default();
        let start_time = self.timetable.slot_start(pos.block_start_ms, index);
        Slot {
            slot_number,
            slot_type: def.slot_type,
            duration: self.timetable.slot_ms() / 1_000,
            sponsor_id: def.sponsor_id,
            priority: def.priority,
            status,
            start_time,
            end_time: start_time + self.timetable.slot_ms(),
        }
    }

    fn block_status(&self) -> BlockStatus {
        if self.is_paused() {
            BlockStatus::Paused
        } else {
            BlockStatus::Active
        }
    }

    fn publish(&self, now_ms: u64) {
        self.published.send_replace(Some(self.snapshot(now_ms)));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::event_log::EventKind;
    use crate::slot::SlotType;

    const HOUR_MS: u64 = 3_600_000;
    /// 2026-10-17T00:00:00Z
    const MIDNIGHT: u64 = 1_792_195_200_000;
    const SLOT_MS: u64 = 600_000;

    fn scheduler_with(slot_secs: u64) -> (BlockScheduler, Arc<EventLog>) {
        let log = Arc::new(EventLog::new(1_000));
        let tt = Timetable::new(&ScheduleConfig::with_slot_duration(slot_secs)).unwrap();
        (BlockScheduler::new(tt, SlotCatalog::default(), log.clone()), log)
    }

    fn scheduler() -> (BlockScheduler, Arc<EventLog>) {
        scheduler_with(600)
    }

    fn assert_one_current(block: &Block) {
        let current = block.slots.iter().filter(|s| s.is_current()).count();
        assert_eq!(current, 1, "exactly one slot must be on screen");
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    #[test]
    fn current_block_has_24_contiguous_slots() {
        let (s, _) = scheduler();
        let block = s.current_block(MIDNIGHT + 5 * HOUR_MS);
        assert_eq!(block.block_number, 2);
        assert_eq!(block.slots.len(), 24);
        assert_eq!(block.length_ms(), 4 * HOUR_MS);
        assert_eq!(block.slots[0].start_time, block.start_time);
        for pair in block.slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert_eq!(pair[0].slot_number + 1, pair[1].slot_number);
        }
        assert_eq!(block.slots[23].end_time, block.end_time);
    }

    #[test]
    fn exactly_one_active_slot_at_every_instant() {
        let (s, _) = scheduler_with(20);
        let mut t = MIDNIGHT;
        while t < MIDNIGHT + 20 * 60_000 {
            let block = s.current_block(t);
            assert_one_current(&block);
            assert_eq!(block.count_status(SlotStatus::Active), 1);
            t += 3_331;
        }
    }

    #[test]
    fn statuses_split_around_the_active_slot() {
        let (s, _) = scheduler();
        // 01:05 → slot index 6 of block 1
        let block = s.current_block(MIDNIGHT + HOUR_MS + 5 * 60_000);
        assert_eq!(block.count_status(SlotStatus::Completed), 6);
        assert_eq!(block.slots[6].status, SlotStatus::Active);
        assert_eq!(block.count_status(SlotStatus::Scheduled), 17);
        assert_eq!(s.current_slot(MIDNIGHT + HOUR_MS + 5 * 60_000).slot_number, 7);
    }

    #[test]
    fn slot_statuses_never_regress_within_a_block() {
        let (s, _) = scheduler_with(20);
        let mut prev = s.current_block(MIDNIGHT);
        let mut t = MIDNIGHT;
        while t < MIDNIGHT + 480_000 {
            t += 1_700;
            let next = s.current_block(t);
            if next.start_time != prev.start_time {
                break;
            }
            for (a, b) in prev.slots.iter().zip(&next.slots) {
                assert!(
                    a.status.can_transition_to(b.status),
                    "slot {} regressed {:?} -> {:?}",
                    a.slot_number,
                    a.status,
                    b.status
                );
            }
            prev = next;
        }
    }

    #[test]
    fn two_schedulers_on_the_same_clock_agree() {
        let (a, _) = scheduler_with(25);
        let (b, _) = scheduler_with(25);
        let mut t = MIDNIGHT - HOUR_MS;
        while t < MIDNIGHT + 26 * HOUR_MS {
            assert_eq!(a.current_block(t), b.current_block(t));
            assert_eq!(a.current_slot(t), b.current_slot(t));
            t += 97_003;
        }
    }

    #[test]
    fn catalog_data_flows_into_slots() {
        let log = Arc::new(EventLog::new(10));
        let tt = Timetable::new(&ScheduleConfig::default()).unwrap();
        let mut entries = BTreeMap::new();
        entries.insert(
            1,
            crate::config::SlotEntry {
                slot_type: SlotType::MainSponsor,
                sponsor: Some("acme".into()),
                priority: None,
            },
        );
        let catalog = SlotCatalog::from_entries(&entries).unwrap();
        let s = BlockScheduler::new(tt, catalog, log);

        let slot = s.current_slot(MIDNIGHT);
        assert_eq!(slot.slot_type, SlotType::MainSponsor);
        assert_eq!(slot.sponsor_id.as_deref(), Some("acme"));
        assert_eq!(slot.duration, 600);

        s.assign_sponsor(2, "bakery").unwrap();
        assert_eq!(
            s.current_slot(MIDNIGHT + SLOT_MS).sponsor_id.as_deref(),
            Some("bakery")
        );
    }

    // ── advance ───────────────────────────────────────────────────────────────

    #[test]
    fn first_advance_activates_current_slot() {
        let (s, log) = scheduler();
        let t = s.advance(MIDNIGHT + 10);
        assert_eq!(
            t,
            vec![Transition {
                block_number: 1,
                slot_number: 1,
                from: SlotStatus::Scheduled,
                to: SlotStatus::Active,
            }]
        );
        assert_eq!(log.len(), 1);
        assert!(s.advance(MIDNIGHT + 20).is_empty(), "advance is idempotent");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn advance_across_slot_boundary_completes_then_activates() {
        let (s, log) = scheduler();
        s.advance(MIDNIGHT);
        let t = s.advance(MIDNIGHT + SLOT_MS);
        assert_eq!(t.len(), 2);
        assert_eq!((t[0].slot_number, t[0].to), (1, SlotStatus::Completed));
        assert_eq!((t[1].slot_number, t[1].to), (2, SlotStatus::Active));

        let events = log.all();
        assert!(events.iter().all(|e| e.device_id.is_none()));
        assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn advance_across_block_boundary_rolls_block() {
        let (s, _) = scheduler();
        s.advance(MIDNIGHT + 4 * HOUR_MS - 1);
        let t = s.advance(MIDNIGHT + 4 * HOUR_MS);
        assert_eq!((t[0].block_number, t[0].slot_number), (1, 24));
        assert_eq!((t[1].block_number, t[1].slot_number), (2, 1));
    }

    #[test]
    fn advance_never_moves_backwards() {
        let (s, log) = scheduler();
        s.advance(MIDNIGHT);
        s.advance(MIDNIGHT + SLOT_MS);
        let logged = log.len();

        assert!(s.advance(MIDNIGHT + SLOT_MS - 1).is_empty());
        assert!(s.advance(MIDNIGHT + 10).is_empty());
        assert_eq!(log.len(), logged);
        assert_eq!(s.subscribe().borrow().clone().unwrap().slot.slot_number, 2);

        // The cursor stayed on slot 2: the next boundary completes slot 2.
        let t = s.advance(MIDNIGHT + 2 * SLOT_MS);
        assert_eq!((t[0].slot_number, t[0].to), (2, SlotStatus::Completed));
        assert_eq!((t[1].slot_number, t[1].to), (3, SlotStatus::Active));
    }

    #[test]
    fn stale_advance_after_block_roll_is_ignored() {
        let (s, _) = scheduler();
        s.advance(MIDNIGHT + 4 * HOUR_MS);
        assert!(s.advance(MIDNIGHT + 4 * HOUR_MS - 1).is_empty());
        let t = s.advance(MIDNIGHT + 4 * HOUR_MS + SLOT_MS);
        assert_eq!((t[0].block_number, t[0].slot_number), (2, 1));
    }

    #[test]
    fn advance_publishes_snapshot() {
        let (s, _) = scheduler();
        let rx = s.subscribe();
        assert!(rx.borrow().is_none());
        s.advance(MIDNIGHT + SLOT_MS * 3);
        let snap = rx.borrow().clone().unwrap();
        assert_eq!(snap.slot.slot_number, 4);
        assert_eq!(snap.block_number, 1);
        assert!(!snap.paused);
    }

    // ── skip ──────────────────────────────────────────────────────────────────

    #[test]
    fn skip_forces_next_slot_active_early() {
        let (s, log) = scheduler();
        let now = MIDNIGHT + 60_000; // slot 1
        let t = s.skip(now).unwrap();
        assert_eq!((t.slot_number, t.to), (1, SlotStatus::Skipped));

        let block = s.current_block(now);
        assert_eq!(block.slots[0].status, SlotStatus::Skipped);
        assert_eq!(block.slots[1].status, SlotStatus::Active);
        assert_one_current(&block);
        assert_eq!(s.current_slot(now).slot_number, 2);

        // Skipped slot is not also logged as completed.
        let statuses: Vec<_> = log.all().iter().filter_map(|e| e.slot_status).collect();
        assert_eq!(
            statuses,
            vec![SlotStatus::Active, SlotStatus::Skipped, SlotStatus::Active]
        );

        // When slot 2's own window arrives nothing changes.
        assert!(s.advance(MIDNIGHT + SLOT_MS).is_empty());
        assert_eq!(s.current_slot(MIDNIGHT + SLOT_MS + 1).slot_number, 2);
    }

    #[test]
    fn skip_last_slot_is_rejected() {
        let (s, _) = scheduler();
        let now = MIDNIGHT + 4 * HOUR_MS - 1_000;
        assert_eq!(
            s.skip(now).unwrap_err(),
            ScheduleError::LastSlotOfBlock { slot: 24 }
        );
        assert_eq!(s.current_slot(now).status, SlotStatus::Active);
    }

    #[test]
    fn overrides_reset_with_the_next_block() {
        let (s, _) = scheduler_with(20);
        s.skip(MIDNIGHT + 1_000).unwrap();
        let next_block = s.current_block(MIDNIGHT + 480_000 + 1_000);
        assert_eq!(next_block.slots[0].status, SlotStatus::Active);
        assert_eq!(next_block.count_status(SlotStatus::Skipped), 0);
    }

    // ── render failure ────────────────────────────────────────────────────────

    #[test]
    fn render_failure_marks_current_slot_error_without_halting() {
        let (s, log) = scheduler();
        let now = MIDNIGHT + 2 * SLOT_MS + 5; // slot 3
        let t = s.report_render_failure(now, 3).unwrap().unwrap();
        assert_eq!(t.to, SlotStatus::Error);
        assert_eq!(s.current_slot(now).status, SlotStatus::Error);
        assert_one_current(&s.current_block(now));

        let last = log.all().pop().unwrap();
        assert_eq!(last.kind, EventKind::Error);

        // Duplicate report is a no-op.
        assert_eq!(s.report_render_failure(now + 1, 3).unwrap(), None);

        // Rotation continues; the errored slot stays errored, not completed.
        let later = MIDNIGHT + 3 * SLOT_MS;
        s.advance(later);
        let block = s.current_block(later);
        assert_eq!(block.slots[2].status, SlotStatus::Error);
        assert_eq!(block.slots[3].status, SlotStatus::Active);
    }

    #[test]
    fn render_failure_for_other_slot_is_rejected() {
        let (s, _) = scheduler();
        let err = s.report_render_failure(MIDNIGHT, 5).unwrap_err();
        assert_eq!(err, ScheduleError::NotCurrentSlot { slot: 5, current: 1 });
        assert_eq!(
            s.report_render_failure(MIDNIGHT, 99).unwrap_err(),
            ScheduleError::UnknownSlot(99)
        );
    }

    #[test]
    fn errored_slot_cannot_be_skipped() {
        let (s, _) = scheduler();
        s.report_render_failure(MIDNIGHT, 1).unwrap();
        assert!(matches!(
            s.skip(MIDNIGHT + 1),
            Err(ScheduleError::NotActive { slot: 1, .. })
        ));
    }

    // ── pause ─────────────────────────────────────────────────────────────────

    #[test]
    fn pause_marks_block_paused_and_resume_clears_it() {
        let (s, _) = scheduler();
        s.pause(MIDNIGHT);
        assert_eq!(s.current_block(MIDNIGHT).status, BlockStatus::Paused);
        assert!(s.snapshot(MIDNIGHT).paused);
        s.resume(MIDNIGHT);
        assert_eq!(s.current_block(MIDNIGHT).status, BlockStatus::Active);
    }
}
