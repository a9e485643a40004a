//! Fleet Gateway - HTTP API for devices and servers
//!
//! This is the main entry point for the gateway service. The control
//! service and the `RocksDB` store run in-process.
//!
//! # Environment
//!
//! - `LISTEN_ADDR` - bind address (default `0.0.0.0:8080`)
//! - `DATA_DIR` - database directory (default `/data/fleet`)
//! - `LOCK_TIMEOUT_MS` - row lock wait in milliseconds (default `0`)
//! - `RUST_LOG` - tracing filter (default `info,fleet=debug`)

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_control::{ControlConfig, FleetService};
use fleet_gateway::{create_router, GatewayConfig, GatewayState};
use fleet_store::{RocksStore, StoreOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fleet Gateway");

    let config = GatewayConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        lock_timeout_ms = config.lock_timeout_ms,
        "Gateway configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open_with(
        &config.data_dir,
        StoreOptions {
            lock_timeout_ms: config.lock_timeout_ms,
        },
    )?);

    let control = Arc::new(FleetService::new(store, ControlConfig::default()));
    tracing::info!("Fleet control initialized");

    let listen_addr = config.listen_addr.clone();
    let app = create_router(GatewayState::new(control, config));

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
