//! HTTP gateway for the device fleet.
//!
//! This crate provides the REST API for registering devices and managing
//! servers. It handles:
//!
//! - JSON request parsing and error formatting
//! - Routing to the [`FleetControl`](fleet_control::FleetControl) service
//! - Tracing, CORS, body size limits and request timeouts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP/JSON
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      fleet-gateway                          │
//! │        Router + Handlers + tower-http middleware            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 fleet-control (FleetService)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                     fleet-store (RocksDB)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_gateway::{GatewayConfig, GatewayState, create_router};
//! use fleet_control::FleetService;
//! use fleet_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/fleet")?);
//! let control = Arc::new(FleetService::with_defaults(store));
//!
//! let state = GatewayState::new(control, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
