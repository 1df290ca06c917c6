pub mod config;
pub mod controller;
pub mod host;
pub mod input;
pub mod mapping;
pub mod persistence;

use crate::controller::bus::{LoopbackBus, VirtualBus};
use crate::host::{console, FeederHost};
use crate::mapping::FeederEngine;
use crate::persistence::ConfigStore;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let override_path = std::env::args().nth(1).map(PathBuf::from);
    let mut store = ConfigStore::locate(override_path);
    store.ensure_default().await?;
    let config = store.load().await?;

    let bus = create_bus();
    let engine =
        FeederEngine::new(config, bus).map_err(|e| eyre!("Failed to start feeder engine: {}", e))?;

    let (command_tx, command_rx) = mpsc::channel(1024);
    let shutdown = CancellationToken::new();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    let _console_handle = tokio::spawn(console::run_console(command_tx));

    let host = FeederHost::create(engine, command_rx, Some(store), shutdown).start();
    let stopped = host.run_until_shutdown().await;
    stopped.finish().await?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// ViGEmBus when available, otherwise the in-memory loopback.
fn create_bus() -> Box<dyn VirtualBus> {
    #[cfg(all(windows, feature = "vigem"))]
    {
        match crate::controller::vigem::ViGEmBus::connect() {
            Ok(bus) => return Box::new(bus),
            Err(e) => warn!("ViGEmBus unavailable ({}), falling back to loopback", e),
        }
    }
    Box::new(LoopbackBus::default())
}
