/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-memory [`DisplayLink`] with per-device scripted behaviour.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DisplayLink, LinkError};
use crate::device::Device;
use crate::wire::{DeviceAck, SlotState};

#[derive(Debug, Clone, Default)]
pub(crate) struct Behaviour {
    pub latency: Duration,
    pub fail: bool,
    /// Never answer; the coordinator's timeout has to fire.
    pub hang: bool,
    pub render_fail: bool,
}

#[derive(Default)]
pub(crate) struct ScriptedLink {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    pushes: Mutex<Vec<(String, SlotState)>>,
    released: Mutex<Vec<String>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, device_id: &str, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .insert(device_id.to_string(), behaviour);
    }

    pub fn pushes_to(&self, device_id: &str) -> Vec<SlotState> {
        self.pushes
            .lock()
            .iter()
            .filter(|(id, _)| id == device_id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn push_order(&self) -> Vec<String> {
        self.pushes.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }
}

#[async_trait]
impl DisplayLink for ScriptedLink {
    async fn push(&self, device: &Device, state: &SlotState) -> Result<DeviceAck, LinkError> {
        let b = self
            .behaviours
            .lock()
            .get(&device.device_id)
            .cloned()
            .unwrap_or_default();
        self.pushes
            .lock()
            .push((device.device_id.clone(), state.clone()));

        if b.hang {
            std::future::pending::<()>().await;
        }
        if !b.latency.is_zero() {
            tokio::time::sleep(b.latency).await;
        }
        if b.fail {
            return Err(LinkError::Unreachable(device.device_id.clone()));
        }
        let mut ack = DeviceAck::for_state(device.device_id.clone(), state);
        ack.render_failed = b.render_fail;
        Ok(ack)
    }

    fn release(&self, device_id: &str) {
        self.released.lock().push(device_id.to_string());
    }
}
