//! # hotspot-server
//!
//! Access point configuration daemon.
//!
//! This binary provides:
//! - REST API for draft editing, presets, flags, backup and automation
//! - The Bluetooth auto-enable service, fed by BlueZ when built with the
//!   `bluetooth` feature and by `POST /api/peripheral/events` otherwise
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package hotspot-server
//!
//! # Explicit configuration file
//! hotspot-server /etc/hotspot/config.toml
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use hotspot_core::DaemonConfig;
use hotspot_server::state::AppState;
use hotspot_server::{api, logging, supervisor};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "HOTSPOT_CONFIG";

fn load_config() -> anyhow::Result<DaemonConfig> {
    let explicit = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from);

    let config = match explicit {
        Some(path) => DaemonConfig::load_from(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DaemonConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    logging::init(config.server.production)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting hotspot-server");

    let state = AppState::new(&config).await?;
    let controller = state.controller.clone();
    let hub = state.hub.clone();
    let host = state.automation.clone();
    let shared = state.shared();

    let shutdown = CancellationToken::new();

    let supervisor_task = tokio::spawn(supervisor::supervise(
        controller,
        hub.clone(),
        host,
        shutdown.clone(),
    ));

    #[cfg(feature = "bluetooth")]
    {
        let watcher = hotspot_core::BluezWatcher::new(hub.clone());
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = watcher.run(token).await {
                error!(error = %e, "Bluetooth watcher stopped");
            }
        });
    }

    let app = api::create_router(shared);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = supervisor_task.await {
        error!(error = %e, "Automation supervisor panicked");
    }
    info!("hotspot-server stopped");

    Ok(())
}
