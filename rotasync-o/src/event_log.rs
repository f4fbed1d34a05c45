/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Append-only record of scheduling and sync events.
//!
//! The log stamps every event with a strictly increasing id and a strictly
//! increasing timestamp (`max(now, previous + 1)`), so two events never share
//! a timestamp and an event appended after a scheduler transition always
//! sorts after it.  Retention is bounded: once `capacity` is reached the
//! oldest events are dropped, ids keep counting.
//!
//! Live consumers (the analytics side) subscribe to a broadcast stream; a
//! lagging subscriber loses events, the log itself never blocks on it.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::slot::SlotStatus;

/// Capacity of the live broadcast channel.
const BROADCAST_CAPACITY: usize = 1_024;

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    SlotChange,
    Heartbeat,
    Error,
    Reconnect,
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub id: u64,
    /// UTC epoch ms.
    pub timestamp: u64,
    /// `None` for transitions recorded by the block scheduler itself.
    pub device_id: Option<String>,
    pub kind: EventKind,
    pub success: bool,
    pub latency_ms: Option<u64>,
    pub block_number: Option<u32>,
    pub slot_number: Option<u32>,
    /// Status the slot moved into, for scheduler transitions.
    pub slot_status: Option<SlotStatus>,
}

/// Caller-supplied part of an event; the log adds id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub device_id: Option<String>,
    pub kind: EventKind,
    pub success: bool,
    pub latency_ms: Option<u64>,
    pub block_number: Option<u32>,
    pub slot_number: Option<u32>,
    pub slot_status: Option<SlotStatus>,
}

impl NewEvent {
    /// A scheduler transition of `(block, slot)` into `status`.
    pub fn scheduler(block_number: u32, slot_number: u32, status: SlotStatus) -> Self {
        let kind = if status == SlotStatus::Error {
            EventKind::Error
        } else {
            EventKind::SlotChange
        };
        Self {
            device_id: None,
            kind,
            success: kind != EventKind::Error,
            latency_ms: None,
            block_number: Some(block_number),
            slot_number: Some(slot_number),
            slot_status: Some(status),
        }
    }

    /// A sync outcome for one device.
    pub fn device(
        device_id: impl Into<String>,
        kind: EventKind,
        success: bool,
        latency_ms: Option<u64>,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            kind,
            success,
            latency_ms,
            block_number: None,
            slot_number: None,
            slot_status: None,
        }
    }

    pub fn at(mut self, block_number: u32, slot_number: u32) -> Self {
        self.block_number = Some(block_number);
        self.slot_number = Some(slot_number);
        self
    }
}

/// Success/total counts behind the system success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRate {
    pub successes: usize,
    pub total: usize,
}

impl SuccessRate {
    /// `successes / total`; `1.0` when nothing was attempted.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

// ── EventLog ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct LogInner {
    events: VecDeque<SyncEvent>,
    next_id: u64,
    last_timestamp: Option<u64>,
}

#[derive(Debug)]
pub struct EventLog {
    inner: Mutex<LogInner>,
    capacity: usize,
    tx: broadcast::Sender<SyncEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Mutex::new(LogInner {
                events: VecDeque::with_capacity(capacity.min(4_096)),
                next_id: 1,
                last_timestamp: None,
            }),
            capacity: capacity.max(1),
            tx,
        }
    }

    /// Stamp and append `event`, returning the stored record.
    pub fn append(&self, now_ms: u64, event: NewEvent) -> SyncEvent {
        let record = {
            let mut inner = self.inner.lock();
            let timestamp = match inner.last_timestamp {
                Some(last) => now_ms.max(last + 1),
                None => now_ms,
            };
            let record = SyncEvent {
                id: inner.next_id,
                timestamp,
                device_id: event.device_id,
                kind: event.kind,
                success: event.success,
                latency_ms: event.latency_ms,
                block_number: event.block_number,
                slot_number: event.slot_number,
                slot_status: event.slot_status,
            };
            inner.next_id += 1;
            inner.last_timestamp = Some(timestamp);
            inner.events.push_back(record.clone());
            while inner.events.len() > self.capacity {
                inner.events.pop_front();
            }
            record
        };
        // No receivers is fine.
        let _ = self.tx.send(record.clone());
        record
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn all(&self) -> Vec<SyncEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    pub fn for_device(&self, device_id: &str) -> Vec<SyncEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.device_id.as_deref() == Some(device_id))
            .cloned()
            .collect()
    }

    /// Events with `timestamp > after_ms`.
    pub fn since(&self, after_ms: u64) -> Vec<SyncEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.timestamp > after_ms)
            .cloned()
            .collect()
    }

    /// Device sync outcomes in the window `(now - window_ms, now]`.
    /// Scheduler-originated events are not sync attempts and are ignored.
    pub fn success_rate(&self, now_ms: u64, window_ms: u64) -> SuccessRate {
        let from = now_ms.saturating_sub(window_ms);
        let inner = self.inner.lock();
        inner
            .events
            .iter()
            .rev()
            .take_while(|e| e.timestamp > from)
            .filter(|e| e.device_id.is_some())
            .fold(SuccessRate::default(), |mut acc, e| {
                acc.total += 1;
                if e.success {
                    acc.successes += 1;
                }
                acc
            })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.inner.lock().last_timestamp
    }

    /// Export the retained events as newline-delimited JSON.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let inner = self.inner.lock();
        let mut out = String::new();
        for event in &inner.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(device: &str) -> NewEvent {
        NewEvent::device(device, EventKind::Heartbeat, true, Some(5))
    }

    fn failed(device: &str) -> NewEvent {
        NewEvent::device(device, EventKind::Error, false, None)
    }

    #[test]
    fn ids_and_timestamps_strictly_increase() {
        let log = EventLog::new(100);
        let a = log.append(1_000, ok("d1"));
        let b = log.append(1_000, ok("d1")); // same wall time
        let c = log.append(900, ok("d2")); // clock behind
        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(a.timestamp, 1_000);
        assert_eq!(b.timestamp, 1_001);
        assert_eq!(c.timestamp, 1_002);
    }

    #[test]
    fn retention_drops_oldest_first() {
        let log = EventLog::new(3);
        for t in 0..5 {
            log.append(t * 10, ok("d1"));
        }
        let events = log.all();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].id, 3);
        assert_eq!(events[2].id, 5);
    }

    #[test]
    fn for_device_filters_and_keeps_order() {
        let log = EventLog::new(100);
        log.append(1, ok("a"));
        log.append(2, ok("b"));
        log.append(3, failed("a"));
        log.append(4, NewEvent::scheduler(1, 2, SlotStatus::Active));
        let a = log.for_device("a");
        assert_eq!(a.len(), 2);
        assert!(a[0].timestamp < a[1].timestamp);
        assert_eq!(a[1].kind, EventKind::Error);
    }

    #[test]
    fn success_rate_counts_only_device_events_in_window() {
        let log = EventLog::new(100);
        log.append(1_000, failed("a")); // outside window
        log.append(50_000, ok("a"));
        log.append(55_000, failed("b"));
        log.append(56_000, NewEvent::scheduler(1, 1, SlotStatus::Completed));
        log.append(60_000, ok("b"));

        let rate = log.success_rate(61_000, 60_000);
        assert_eq!(rate, SuccessRate { successes: 2, total: 3 });
        assert!((rate.ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn scheduler_error_transition_is_an_error_event() {
        let e = NewEvent::scheduler(2, 5, SlotStatus::Error);
        assert_eq!(e.kind, EventKind::Error);
        assert!(!e.success);
        assert!(e.device_id.is_none());
        let s = NewEvent::scheduler(2, 5, SlotStatus::Skipped);
        assert_eq!(s.kind, EventKind::SlotChange);
    }

    #[test]
    fn empty_window_rate_is_one() {
        let log = EventLog::new(10);
        assert_eq!(log.success_rate(1_000, 60_000).ratio(), 1.0);
    }

    #[test]
    fn since_is_exclusive() {
        let log = EventLog::new(10);
        log.append(10, ok("a"));
        log.append(20, ok("a"));
        assert_eq!(log.since(10).len(), 1);
        assert_eq!(log.since(0).len(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_appended_events() {
        let log = EventLog::new(10);
        let mut rx = log.subscribe();
        let stored = log.append(7, ok("tab1"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received, stored);
    }

    #[test]
    fn json_lines_export_one_line_per_event() {
        let log = EventLog::new(10);
        log.append(1, ok("a"));
        log.append(2, NewEvent::scheduler(3, 4, SlotStatus::Active));
        let out = log.to_json_lines().unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: SyncEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.block_number, Some(3));
        assert_eq!(second.slot_status, Some(SlotStatus::Active));
        assert!(lines[0].contains("\"deviceId\":\"a\""));
    }
}
