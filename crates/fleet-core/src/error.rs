//! Common error types for the fleet workspace.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// Core errors that can occur throughout the fleet system.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}
