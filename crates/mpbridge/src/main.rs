//! mpbridge
//!
//! Bridges bus command records to a serial-controlled display and publishes
//! its replies. The bus is exposed on stdio as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bus_runtime::{ServiceHandle, ServiceManager, ServiceState};

use mpbridge::bus::StdioBus;
use mpbridge::codes::CodeTables;
use mpbridge::config::{ConfigLoader, ConfigWatcher};
use mpbridge::device::DisplayService;

/// Media player display bridge
#[derive(Parser, Debug)]
#[command(name = "mpbridge")]
#[command(about = "Serial display bridge for media players", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./mpbridge.toml")]
    config: PathBuf,

    /// Don't reload the player identity when the config file changes
    #[arg(long)]
    no_watch: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the bus, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mpbridge=info,bus_runtime=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    info!("Starting mpbridge v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::load(&args.config)?;
    let tables = Arc::new(CodeTables::load(&config.tables).await?);
    let (identity_tx, identity_rx) = watch::channel(config.player.clone());

    let service_manager = ServiceManager::new_shared();

    let stdio = StdioBus::spawn(
        service_manager.publisher(),
        config.bus.command_topic.clone(),
        vec![
            config.bus.notifications_topic.clone(),
            config.bus.settings_topic.clone(),
        ],
    );

    let display = service_manager
        .spawn(DisplayService::new(&config, tables, identity_rx))
        .await?;
    if let Err(e) = wait_until_running(&display).await {
        stdio.shutdown();
        return Err(e);
    }

    if !args.no_watch {
        match ConfigWatcher::new(&args.config, identity_tx) {
            Ok(watcher) => {
                tokio::spawn(watcher.run());
                info!("Config watcher started");
            }
            Err(e) => {
                error!("Failed to start config watcher: {}", e);
            }
        }
    }

    for (id, state) in service_manager.list() {
        info!("  - {} ({})", id, state);
    }

    shutdown_signal(service_manager.clone()).await;
    stdio.shutdown();

    info!("mpbridge stopped");
    Ok(())
}

/// Wait for the service to leave `Starting`
async fn wait_until_running(handle: &ServiceHandle) -> Result<()> {
    loop {
        match handle.state() {
            ServiceState::Starting => tokio::time::sleep(Duration::from_millis(20)).await,
            ServiceState::Running => return Ok(()),
            state => bail!("Service {} did not start ({})", handle.service_id, state),
        }
    }
}

async fn shutdown_signal(service_manager: Arc<ServiceManager>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }

    info!("Shutting down services...");
    if let Err(e) = service_manager.shutdown_all().await {
        warn!("Some services did not shut down cleanly: {}", e);
    }
}
