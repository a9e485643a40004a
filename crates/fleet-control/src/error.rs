//! Error types for the control layer.
//!
//! This module defines all errors that can occur while creating and updating
//! servers and devices.

use fleet_core::{DeviceId, ServerId};
use fleet_store::{ServerStatus, StoreError};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A request field failed validation. Nothing was written.
    #[error("invalid {field}: {message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// The requested status is not reachable from the current one.
    #[error("invalid status transition for server {server_id}: cannot transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// The server being transitioned.
        server_id: ServerId,
        /// The current status.
        from: ServerStatus,
        /// The requested status.
        to: ServerStatus,
    },

    /// The requested server was not found.
    #[error("server not found: {0}")]
    ServerNotFound(ServerId),

    /// The requested device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ControlError {
    /// Build a validation error for `field`.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::InvalidTransition { .. } => 400,
            Self::ServerNotFound(_) | Self::DeviceNotFound(_) => 404,
            Self::Store(StoreError::Conflict(_)) => 409,
            Self::Store(_) => 500,
        }
    }

    /// Returns true if the failed unit of work can be recomputed and retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }
}
