/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use rotasync_o::wire::{DeviceAck, SlotState};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Rotasync-N display node agent.
///
/// Example:
///   rotasync-n -p 7101 -i beamer01 --fail-slot 7
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rotasync-n",
    about = "Rotasync-N – display node agent, acks slot pushes from Rotasync-O",
    long_about = None,
)]
struct Cli {
    /// Address to listen on for the coordinator.
    #[arg(short = 'b', long = "bind", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on for the coordinator.
    #[arg(short = 'p', long = "port", default_value_t = 7101)]
    port: u16,

    /// Device id reported in every ack.
    #[arg(short = 'i', long = "device-id", default_value = "node01")]
    device_id: String,

    /// Report a render failure whenever this slot is pushed.
    #[arg(long = "fail-slot")]
    fail_slot: Option<u32>,

    /// Delay every ack by this many milliseconds (simulates a slow display).
    #[arg(long = "delay-ms", default_value_t = 0)]
    delay_ms: u64,
}

impl Cli {
    fn ack_for(&self, state: &SlotState) -> DeviceAck {
        let mut ack = DeviceAck::for_state(self.device_id.clone(), state);
        ack.render_failed = self.fail_slot == Some(state.slot_number);
        ack
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Arc::new(Cli::parse());
    info!(
        device_id = %cli.device_id,
        port = cli.port,
        fail_slot = ?cli.fail_slot,
        delay_ms = cli.delay_ms,
        "Rotasync-N starting up..."
    );

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Arc<Cli>) -> Result<()> {
    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot listen on {addr}"))?;
    info!("Waiting for coordinator on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        info!(%peer, "coordinator connected");
        let cli = Arc::clone(&cli);
        tokio::spawn(async move {
            if let Err(e) = serve(stream, peer, cli).await {
                warn!(%peer, "connection ended: {:#}", e);
            }
        });
    }
}

/// Answer every pushed `SlotState` line with one `DeviceAck` line.
async fn serve(stream: TcpStream, peer: SocketAddr, cli: Arc<Cli>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut showing: Option<(u32, u32)> = None;

    while let Some(line) = lines.next_line().await? {
        // Dropping the connection fails the coordinator's push at once
        // instead of leaving it to its ack timeout.
        let state: SlotState =
            serde_json::from_str(&line).context("malformed push, closing connection")?;

        let current = (state.block_number, state.slot_number);
        if showing != Some(current) {
            info!(
                block = state.block_number,
                slot = state.slot_number,
                slot_type = ?state.slot_type,
                sponsor = ?state.sponsor_id,
                paused = state.paused,
                "now showing"
            );
            showing = Some(current);
        } else {
            debug!(block = state.block_number, slot = state.slot_number, "heartbeat");
        }

        if cli.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cli.delay_ms)).await;
        }
        let ack = cli.ack_for(&state);
        if ack.render_failed {
            warn!(slot = state.slot_number, "simulated render failure");
        }
        let mut out = serde_json::to_string(&ack)?;
        out.push('\n');
        write.write_all(out.as_bytes()).await?;
    }
    info!(%peer, "coordinator disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotasync_o::slot::{SlotStatus, SlotType};
    use tokio::task::JoinHandle;

    fn cli(fail_slot: Option<u32>) -> Cli {
        Cli {
            bind: "127.0.0.1".into(),
            port: 0,
            device_id: "ipad01".into(),
            fail_slot,
            delay_ms: 0,
        }
    }

    fn state(slot: u32) -> SlotState {
        SlotState {
            block_number: 2,
            slot_number: slot,
            slot_type: SlotType::Standard,
            slot_status: SlotStatus::Active,
            sponsor_id: None,
            slot_start_time: 0,
            slot_end_time: 600_000,
            block_end_time: 14_400_000,
            paused: false,
            timestamp: 0,
        }
    }

    #[test]
    fn ack_echoes_block_and_slot() {
        let ack = cli(None).ack_for(&state(5));
        assert_eq!(ack.device_id, "ipad01");
        assert_eq!((ack.block_number, ack.slot_number), (2, 5));
        assert!(!ack.render_failed);
    }

    #[test]
    fn fail_slot_only_fails_that_slot() {
        let c = cli(Some(7));
        assert!(c.ack_for(&state(7)).render_failed);
        assert!(!c.ack_for(&state(8)).render_failed);
    }

    async fn connect(c: Cli) -> (TcpStream, JoinHandle<Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let c = Arc::new(c);
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await?;
            serve(stream, peer, c).await
        });
        (TcpStream::connect(addr).await.unwrap(), server)
    }

    #[tokio::test]
    async fn serve_acks_each_line() {
        let (stream, _server) = connect(cli(Some(3))).await;
        let (r, mut w) = stream.into_split();
        let mut replies = BufReader::new(r).lines();
        let mut payload = String::new();
        for slot in [3, 4] {
            payload.push_str(&serde_json::to_string(&state(slot)).unwrap());
            payload.push('\n');
        }
        w.write_all(payload.as_bytes()).await.unwrap();

        let first: DeviceAck =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();
        let second: DeviceAck =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.slot_number, 3);
        assert!(first.render_failed);
        assert_eq!(second.slot_number, 4);
        assert!(!second.render_failed);
    }

    #[tokio::test]
    async fn malformed_push_closes_the_connection() {
        let (stream, server) = connect(cli(None)).await;
        let (r, mut w) = stream.into_split();
        let mut replies = BufReader::new(r).lines();
        w.write_all(b"garbage\n").await.unwrap();

        assert_eq!(replies.next_line().await.unwrap(), None);
        let err = server.await.unwrap().unwrap_err();
        assert!(format!("{err:#}").contains("malformed push"));
    }
}
