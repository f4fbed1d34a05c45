/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! JSON-lines over TCP.
//!
//! One persistent connection per device.  A push writes one `SlotState`
//! line and reads one `DeviceAck` line.  Any error, or a push abandoned
//! mid-exchange by a timeout, drops the connection; the next push
//! reconnects.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use super::{check_ack, DisplayLink, LinkError};
use crate::device::Device;
use crate::wire::{DeviceAck, SlotState};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set while an exchange is in progress; still set on the next lock
    /// means the previous push was cancelled half way.
    in_flight: bool,
}

impl Connection {
    async fn open(endpoint: &str) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| LinkError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
            in_flight: false,
        })
    }

    async fn exchange(&mut self, state: &SlotState) -> Result<DeviceAck, LinkError> {
        self.in_flight = true;
        let mut line = serde_json::to_string(state)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply).await? == 0 {
            return Err(LinkError::Closed);
        }
        let ack: DeviceAck = serde_json::from_str(reply.trim_end())?;
        self.in_flight = false;
        check_ack(state, ack)
    }
}

type ConnSlot = Arc<tokio::sync::Mutex<Option<Connection>>>;

#[derive(Default)]
pub struct TcpDisplayLink {
    connections: parking_lot::Mutex<HashMap<String, ConnSlot>>,
}

impl TcpDisplayLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, device_id: &str) -> ConnSlot {
        Arc::clone(
            self.connections
                .lock()
                .entry(device_id.to_string())
                .or_default(),
        )
    }
}

#[async_trait]
impl DisplayLink for TcpDisplayLink {
    async fn push(&self, device: &Device, state: &SlotState) -> Result<DeviceAck, LinkError> {
        let endpoint = device
            .endpoint
            .as_deref()
            .ok_or_else(|| LinkError::NoEndpoint(device.device_id.clone()))?;

        let slot = self.slot(&device.device_id);
        let mut guard = slot.lock().await;

        let conn = match guard.take() {
            Some(conn) if !conn.in_flight => conn,
            stale => {
                if stale.is_some() {
                    debug!(device = %device.device_id, "discarding connection left mid-exchange");
                }
                debug!(device = %device.device_id, endpoint, "connecting");
                Connection::open(endpoint).await?
            }
        };

        let result = guard.insert(conn).exchange(state).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    fn release(&self, device_id: &str) {
        self.connections.lock().remove(device_id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
