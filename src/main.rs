mod chain;
mod config;
mod faucet;
mod http;
mod launcher;
mod models;
mod rpc;
mod slack;
mod state;

use std::net::SocketAddr;

use crate::config::ApiConfig;
use crate::faucet::FaucetService;
use crate::launcher::LauncherService;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let faucet = match &config.faucet {
        Some(faucet_config) => {
            let service = FaucetService::connect(faucet_config)
                .await
                .context("Failed to initialize faucet")?;
            info!(networks = service.network_count(), "Faucet enabled");
            Some(service)
        }
        None => None,
    };
    let launcher = match &config.launcher {
        Some(launcher_config) => {
            let service = LauncherService::connect(launcher_config)
                .await
                .context("Failed to initialize escrow launcher")?;
            info!(networks = service.network_count(), "Escrow launcher enabled");
            Some(service)
        }
        None => None,
    };
    let app_state = AppState::new(faucet, launcher);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("HUMAN API listening on {local_addr}");

    let router: Router = http::router(app_state, config.server.static_dir.as_deref());
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::spawn(shutdown_signal(shutdown_tx));
    server
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await
        .context("HTTP server exited with error")?;

    info!("HTTP server stopped");
    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false);
    match std::env::var("HUMAN_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.compact().init(),
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    shutdown_tx.send(true).ok();
    info!("Shutdown signal dispatched");
}
