/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Runtime wiring: builds every component from a [`RotationConfig`] and
//! owns the background tasks.
//!
//! ```text
//!               ┌──────────── advance timer (1 task)
//! Clock ──► BlockScheduler ◄─ sync lanes (1 task per device) ──► DisplayLink
//!               │                     │
//!               └──► EventLog ◄───────┴──► HealthMonitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::SlotCatalog;
use crate::clock::Clock;
use crate::config::RotationConfig;
use crate::control::{self, ControlHandler};
use crate::event_log::EventLog;
use crate::health::HealthMonitor;
use crate::link::DisplayLink;
use crate::registry::{DeviceRegistry, RegisterRequest};
use crate::schedule::{BlockScheduler, Timetable};
use crate::sync::SyncCoordinator;

/// Upper bound on the advance timer's sleep, so clock steps are noticed.
const ADVANCE_MAX_WAIT: Duration = Duration::from_secs(1);

pub struct RotationService {
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    scheduler: Arc<BlockScheduler>,
    coordinator: Arc<SyncCoordinator>,
    control: Arc<ControlHandler>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RotationService {
    /// Validate `config`, build all components and register the configured
    /// devices.  Devices the registry rejects are logged and skipped.
    ///
    /// # Errors
    /// Any configuration error; the caller should refuse to start.
    pub fn build(
        config: &RotationConfig,
        clock: Arc<dyn Clock>,
        link: Arc<dyn DisplayLink>,
    ) -> Result<Self> {
        config.validate().context("invalid rotation configuration")?;

        let timetable = Timetable::new(&config.schedule).context("invalid schedule")?;
        let catalog = SlotCatalog::from_entries(&config.slots).context("invalid slot catalog")?;
        let events = Arc::new(EventLog::new(config.event_log.capacity));
        let scheduler = Arc::new(BlockScheduler::new(timetable, catalog, Arc::clone(&events)));
        let registry = Arc::new(DeviceRegistry::new(config.sync.clone()));
        let health = Arc::new(HealthMonitor::new(
            config.health.clone(),
            Arc::clone(&events),
            Arc::clone(&clock),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&scheduler),
            registry,
            health,
            Arc::clone(&events),
            link,
            Arc::clone(&clock),
            config.sync.clone(),
        ));
        let control = Arc::new(ControlHandler::new(
            Arc::clone(&coordinator),
            Arc::clone(&scheduler),
            Arc::clone(&clock),
            config.layers.clone(),
            true,
        ));

        for (id, entry) in &config.devices {
            if let Err(e) = coordinator.register(RegisterRequest::from_entry(id, entry)) {
                warn!(device = %id, error = %e, "configured device rejected");
            }
        }
        info!(
            block_ms = scheduler.timetable().block_ms(),
            blocks_per_day = scheduler.timetable().blocks_per_day(),
            devices = coordinator.registry().len(),
            layers = ?config.layers.enabled(),
            "rotation service built"
        );

        Ok(Self {
            clock,
            events,
            scheduler,
            coordinator,
            control,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn scheduler(&self) -> &Arc<BlockScheduler> {
        &self.scheduler
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn control(&self) -> &Arc<ControlHandler> {
        &self.control
    }

    /// Spawn the advance timer, one sync lane per registered device and,
    /// if given, the control listener.
    pub fn start(&self, control_listener: Option<TcpListener>) {
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(advance_loop(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.clock),
            self.shutdown.clone(),
        )));

        let ids: Vec<String> = self
            .coordinator
            .registry()
            .list(&Default::default())
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        for id in &ids {
            self.coordinator.spawn(id);
        }

        if let Some(listener) = control_listener {
            tasks.push(tokio::spawn(control::serve(
                listener,
                Arc::clone(&self.control),
                self.shutdown.clone(),
            )));
        }
        info!(lanes = ids.len(), "rotation service started");
    }

    /// Stop every task started by [`start`](Self::start) and wait for them.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.coordinator.shutdown().await;
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!(events = self.events.len(), "rotation service stopped");
    }
}

/// Global timer: advance the scheduler at every slot boundary.
async fn advance_loop(
    scheduler: Arc<BlockScheduler>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) {
    loop {
        let now = clock.now_ms();
        scheduler.advance(now);
        let until_boundary = scheduler.position(now).slot_end_ms.saturating_sub(now);
        let wait = Duration::from_millis(until_boundary.max(1)).min(ADVANCE_MAX_WAIT);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    debug!("advance timer stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::DeviceStatus;
    use crate::link::scripted::ScriptedLink;
    use crate::slot::SlotStatus;

    /// 2026-10-17T00:00:00Z
    const MIDNIGHT: u64 = 1_792_195_200_000;

    const YAML: &str = r#"
schedule:
  slot_duration_secs: 600
slots:
  1: { type: mainSponsor, sponsor: "acme" }
devices:
  beamer01: { type: projector, refresh_rate: 60, primary: true }
  ipad01:   { type: tablet, refresh_rate: 30 }
  watch01:  { type: smartwatch, refresh_rate: 30 }
"#;

    fn build(yaml: &str) -> Result<(RotationService, ManualClock, Arc<ScriptedLink>)> {
        let config: RotationConfig = serde_yaml::from_str(yaml)?;
        let clock = ManualClock::new(MIDNIGHT + 1_000);
        let link = Arc::new(ScriptedLink::new());
        let svc = RotationService::build(&config, Arc::new(clock.clone()), link.clone())?;
        Ok((svc, clock, link))
    }

    #[test]
    fn invalid_schedule_refuses_to_build() {
        let err = build("schedule: { slot_duration_secs: 17 }").err().unwrap();
        assert!(format!("{err:#}").contains("invalid rotation configuration"));
    }

    #[test]
    fn configured_devices_are_registered_and_unknown_types_skipped() {
        let (svc, _, _) = build(YAML).unwrap();
        let reg = svc.coordinator().registry();
        assert_eq!(reg.len(), 2);
        assert!(reg.get("beamer01").unwrap().is_primary);
        assert!(reg.get("watch01").is_none());
    }

    #[test]
    fn catalog_entries_reach_the_scheduler() {
        let (svc, clock, _) = build(YAML).unwrap();
        let slot = svc.scheduler().current_slot(clock.now_ms());
        assert_eq!(slot.slot_number, 1);
        assert_eq!(slot.sponsor_id.as_deref(), Some("acme"));
        assert_eq!(slot.priority, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn started_service_syncs_devices_and_stops_cleanly() {
        let (svc, _, link) = build(YAML).unwrap();
        svc.start(None);
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let reg = svc.coordinator().registry();
        assert_eq!(reg.get("beamer01").unwrap().status, DeviceStatus::Online);
        assert_eq!(reg.get("ipad01").unwrap().status, DeviceStatus::Online);
        // 500 ms vs 1000 ms lanes: 0, 500, 1000 and 0, 1000.
        assert_eq!(link.pushes_to("beamer01").len(), 3);
        assert_eq!(link.pushes_to("ipad01").len(), 2);
        // The advance timer logged the live slot once.
        let activations = svc
            .events()
            .all()
            .into_iter()
            .filter(|e| e.device_id.is_none() && e.slot_status == Some(SlotStatus::Active))
            .count();
        assert_eq!(activations, 1);

        svc.shutdown().await;
        let after = svc.events().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(svc.events().len(), after);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_timer_follows_the_clock() {
        let (svc, clock, _) = build("{}").unwrap();
        svc.start(None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        clock.advance(600_000);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let snapshot = svc.scheduler().subscribe().borrow().clone().unwrap();
        assert_eq!(snapshot.slot.slot_number, 2);
        svc.shutdown().await;
    }
}
