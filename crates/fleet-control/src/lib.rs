//! Server lifecycle and device allocation for the fleet.
//!
//! This crate provides the business logic for creating and updating servers
//! and devices. Every write is one store transaction; a request to start a
//! server picks a device and resolves to `running` or `error` before the
//! transaction commits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gateway (HTTP)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       FleetService                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │    Slug     │ │  Allocator  │ │    Lifecycle        │    │
//! │  │  Generator  │ │ (skip-lock) │ │    State Machine    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌────────────┐
//!                       │   Store    │
//!                       │ (RocksDB)  │
//!                       └────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_control::{
//!     CreateDeviceRequest, CreateServerRequest, FleetControl, FleetService, ServerPatch,
//!     ServerStatus,
//! };
//! use fleet_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/fleet")?);
//! let control = FleetService::with_defaults(store);
//!
//! control.create_device(CreateDeviceRequest::new("edge-1")).await?;
//! let server = control.create_server(CreateServerRequest::new("My Cool Server")).await?;
//! assert_eq!(server.subdomain, "my-cool-server");
//!
//! let server = control
//!     .update_server(&server.server_id, ServerPatch::status(ServerStatus::Starting))
//!     .await?;
//! println!("{} is {}", server.name, server.status());
//! # Ok(())
//! # }
//! ```
//!
//! # State Machine
//!
//! - `Stopped` → `Starting`
//! - `Starting` → `Running` (device bound) or `Error` (no device)
//! - `Running` → `Stopped` (device released)
//! - `Error` → `Starting` (retry)
//!
//! Requesting the current status is a no-op. See the [`lifecycle`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod allocator;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod slug;
pub mod types;

pub use allocator::Allocation;
pub use error::{ControlError, Result};
pub use service::{FleetControl, FleetService};
pub use types::{ControlConfig, CreateDeviceRequest, CreateServerRequest, DevicePatch, ServerPatch};

// Re-export commonly used types from dependencies for convenience
pub use fleet_core::{DeviceId, ServerId};
pub use fleet_store::{Device, Server, ServerState, ServerStatus};
