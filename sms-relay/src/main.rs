//! sms-relay binary entry point.
//!
//! Usage:
//! ```bash
//! sms-relay --config relay.toml
//! PORT=3001 WS_PORT=8080 sms-relay
//! ```

use anyhow::Context;
use sms_relay::http::{build_channel_router, build_router};
use sms_relay::maintenance::spawn_maintenance_task;
use sms_relay::{Config, SmsRelay};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config_path = get_config_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    if let Some(key_id) = &config.storage.encryption_key_id {
        tracing::info!("At-rest encryption key id configured: {}", key_id);
    }

    let api_addr = config.server.api_bind_address.clone();
    let channel_addr = config.server.channel_bind_address.clone();
    let maintenance = config.maintenance.clone();

    let relay = Arc::new(SmsRelay::new(config));
    let maintenance_task = spawn_maintenance_task(relay.clone(), maintenance);

    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("binding Control API on {api_addr}"))?;
    let channel_listener = TcpListener::bind(&channel_addr)
        .await
        .with_context(|| format!("binding device channel on {channel_addr}"))?;

    tracing::info!(
        "sms-relay v{} listening: API on {}, channel on {}",
        env!("CARGO_PKG_VERSION"),
        api_listener.local_addr()?,
        channel_listener.local_addr()?
    );

    let api = axum::serve(
        api_listener,
        build_router(relay.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .into_future();
    let channel = axum::serve(channel_listener, build_channel_router(relay)).into_future();

    tokio::select! {
        result = api => result.context("Control API server failed")?,
        result = channel => result.context("device channel server failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    maintenance_task.abort();
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}
