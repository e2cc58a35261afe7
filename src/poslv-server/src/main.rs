// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod driver_task;
mod publisher;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use poslv_app::{init_logging, normalize_name, ConfigError};
use poslv_backend::{register_builtin_sources_on, RegistrationContext};
use poslv_core::sink::NullSink;
use poslv_core::{DynResult, EventSink};

use config::ServerConfig;
use driver_task::DriverTaskConfig;
use publisher::BroadcastSink;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - POS LV sensor driver daemon");
const SHUTDOWN_GRACE: Duration = Duration::from_millis(400);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Packet source backend (tcp-json, simulated)
    #[arg(short = 'b', long = "backend")]
    backend: Option<String>,
    /// Sensor host
    #[arg(long = "host")]
    host: Option<String>,
    /// Sensor port
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Frame identifier for published events
    #[arg(long = "frame-id")]
    frame_id: Option<String>,
    /// IP address for the JSON-lines publisher
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
}

/// Ctrl+C, plus SIGTERM on unix.
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the handlers; signals delivered from here on are observed.
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for the first signal and return its name.
    async fn recv(&mut self) -> std::io::Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                res = signal::ctrl_c() => res.map(|_| "Ctrl+C"),
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.map(|_| "Ctrl+C")
        }
    }
}

/// Apply command line overrides on top of the loaded configuration.
fn apply_cli_overrides(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(ref backend) = cli.backend {
        cfg.source.backend = backend.clone();
    }
    if let Some(ref host) = cli.host {
        cfg.source.host = host.clone();
    }
    if let Some(port) = cli.port {
        cfg.source.port = port;
    }
    if let Some(ref frame_id) = cli.frame_id {
        cfg.general.frame_id = frame_id.clone();
    }
    if let Some(listen) = cli.listen {
        cfg.publish.listen = listen;
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut registry = RegistrationContext::new();
    register_builtin_sources_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    apply_cli_overrides(&cli, &mut cfg);
    cfg.validate().map_err(ConfigError::Invalid)?;

    init_logging(cfg.general.log_level.as_deref());
    let mut shutdown_signal = ShutdownSignal::new()?;

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let backend = normalize_name(&cfg.source.backend);
    if !registry.is_source_registered(&backend) {
        return Err(format!(
            "Unknown packet source: {} (available: {})",
            cfg.source.backend,
            registry.registered_sources().join(", ")
        )
        .into());
    }
    info!(
        "Starting poslv-server (source: {}, sensor: {})",
        cfg.source.backend,
        cfg.endpoint()
    );

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (line_tx, _) = broadcast::channel::<Arc<str>>(cfg.publish.buffer.max(1));

    let sink: Arc<dyn EventSink> = if cfg.publish.enabled {
        Arc::new(BroadcastSink::new(line_tx.clone()))
    } else {
        Arc::new(NullSink)
    };

    let supervisor = driver_task::build_supervisor(
        DriverTaskConfig {
            registry: Arc::new(registry),
            backend,
            access: cfg.source_access(),
            supervisor: cfg.supervisor_config(),
            retry: cfg.retry_policy(),
        },
        sink,
    )?;
    let health = supervisor.health_handle();

    let driver_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(driver_task::run_driver_task(
        supervisor,
        driver_shutdown_rx,
    )));

    let ticker_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(publisher::run_health_ticker(
        health,
        line_tx.clone(),
        Duration::from_millis(cfg.diagnostics.publish_interval_ms),
        ticker_shutdown_rx,
    )));

    if cfg.publish.enabled {
        let publish_addr = SocketAddr::from((cfg.publish.listen, cfg.publish.port));
        let publisher_tx = line_tx.clone();
        let publisher_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            if let Err(e) =
                publisher::run_publisher(publish_addr, publisher_tx, publisher_shutdown_rx).await
            {
                error!("Publisher error: {:?}", e);
            }
        }));
    }

    let received = shutdown_signal.recv().await?;
    info!("{} received, shutting down", received);
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
