/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use rotasync_o::clock::SystemClock;
use rotasync_o::config::ConfigManager;
use rotasync_o::link::TcpDisplayLink;
use rotasync_o::service::RotationService;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Rotasync-O slot rotation scheduler and device sync coordinator.
///
/// Example:
///   rotasync-o -c rotation.yaml -l 0.0.0.0:7100
#[derive(Debug, Parser)]
#[command(
    name = "rotasync-o",
    about = "Rotasync-O – slot/block rotation scheduler and device sync coordinator",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML rotation configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Address of the JSON-lines control endpoint.
    #[arg(short = 'l', long = "control", default_value = "127.0.0.1:7100")]
    control: String,

    /// Seconds between health summaries in the log (0 disables them).
    #[arg(long = "health-log-secs", default_value_t = 30)]
    health_log_secs: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Rotasync-O starting up...");

    let cli = Cli::parse();
    info!(
        config = ?cli.config,
        control = %cli.control,
        health_log_secs = cli.health_log_secs,
        "Configuration"
    );

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config_manager = ConfigManager::new();
    match &cli.config {
        Some(path) => {
            if let Err(e) = config_manager.load_from_file(path) {
                error!("Failed to load rotation configuration: {:#}", e);
                process::exit(1);
            }
        }
        None => {
            warn!("No configuration file provided, using default 600 s slots and no devices");
        }
    }
    let config = config_manager.into_config();

    // ── Build and start ───────────────────────────────────────────────────────
    let service = match RotationService::build(
        &config,
        Arc::new(SystemClock::new()),
        Arc::new(TcpDisplayLink::new()),
    ) {
        Ok(service) => service,
        Err(e) => {
            error!("Refusing to start: {:#}", e);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(&cli.control).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot bind control endpoint {}: {}", cli.control, e);
            process::exit(1);
        }
    };
    service.start(Some(listener));

    let health_log = (cli.health_log_secs > 0).then(|| {
        let control = Arc::clone(service.control());
        let period = Duration::from_secs(cli.health_log_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = control.health_report();
                info!(
                    devices = report.devices.len(),
                    healthy = report.healthy,
                    degraded = report.degraded,
                    critical = report.critical,
                    success_rate = report.system_success_rate,
                    sync_status = ?report.sync_status,
                    "Health summary"
                );
            }
        })
    });

    shutdown_signal().await;

    if let Some(task) = health_log {
        task.abort();
    }
    service.shutdown().await;
    info!("Rotasync-O stopped");
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Cannot install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
