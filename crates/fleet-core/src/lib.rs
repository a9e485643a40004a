//! Core types and utilities for the device fleet manager.
//!
//! This crate provides the foundational types used throughout the fleet workspace:
//!
//! - **Identifiers**: Strongly-typed IDs for devices and servers
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use fleet_core::{DeviceId, ServerId};
//!
//! // Generate fresh identifiers
//! let device_id = DeviceId::generate();
//! let server_id = ServerId::generate();
//!
//! // Identifiers round-trip through their string form
//! let parsed: ServerId = server_id.to_string().parse().unwrap();
//! assert_eq!(parsed, server_id);
//! # let _ = device_id;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::CoreError;
pub use ids::{DeviceId, IdError, ServerId};
