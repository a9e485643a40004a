//! Request types and configuration for control operations.
//!
//! Patch types only name the fields a caller may change. Any other key in a
//! request body (`device`, `subdomain`, `created_at`, `last_seen`, ...) is
//! dropped during deserialization.

use fleet_store::ServerStatus;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Request to create a new server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateServerRequest {
    /// Human-chosen name; the subdomain is derived from it.
    #[serde(default)]
    pub name: String,
}

impl CreateServerRequest {
    /// Create a new request with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Partial update of a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerPatch {
    /// New name. Changing it regenerates the subdomain.
    #[serde(default)]
    pub name: Option<String>,
    /// Requested status. Omitted means no change.
    #[serde(default)]
    pub status: Option<ServerStatus>,
}

impl ServerPatch {
    /// A patch that only requests a status change.
    #[must_use]
    pub const fn status(status: ServerStatus) -> Self {
        Self {
            name: None,
            status: Some(status),
        }
    }

    /// A patch that only renames the server.
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            status: None,
        }
    }
}

/// Request to register a new device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeviceRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether the device starts online.
    #[serde(default = "default_online")]
    pub is_online: bool,
}

const fn default_online() -> bool {
    true
}

impl CreateDeviceRequest {
    /// Create a request for an online device.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_online: true,
        }
    }

    /// Set the initial online flag.
    #[must_use]
    pub const fn with_online(mut self, is_online: bool) -> Self {
        self.is_online = is_online;
        self
    }
}

/// Partial update of a device. Any successful update also bumps `last_seen`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicePatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New online flag.
    #[serde(default)]
    pub is_online: Option<bool>,
}

/// Configuration for the control service.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Minimum server name length, in characters.
    #[serde(default = "ControlConfig::default_server_name_min")]
    pub server_name_min: usize,
    /// Maximum server name length, in characters.
    #[serde(default = "ControlConfig::default_server_name_max")]
    pub server_name_max: usize,
    /// Maximum device name length, in characters.
    #[serde(default = "ControlConfig::default_device_name_max")]
    pub device_name_max: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            server_name_min: Self::default_server_name_min(),
            server_name_max: Self::default_server_name_max(),
            device_name_max: Self::default_device_name_max(),
        }
    }
}

impl ControlConfig {
    const fn default_server_name_min() -> usize {
        3
    }

    const fn default_server_name_max() -> usize {
        50
    }

    const fn default_device_name_max() -> usize {
        255
    }

    /// Trim and check a server name, returning the stored form.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the name is out of bounds.
    pub fn validate_server_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        let len = name.chars().count();

        if len < self.server_name_min || len > self.server_name_max {
            return Err(ControlError::validation(
                "name",
                format!(
                    "Server name must be between {} and {} characters.",
                    self.server_name_min, self.server_name_max
                ),
            ));
        }

        Ok(name.to_string())
    }

    /// Trim and check a device name, returning the stored form.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the name is blank or too long.
    pub fn validate_device_name(&self, name: &str) -> Result<String> {
        let name = name.trim();

        if name.is_empty() {
            return Err(ControlError::validation("name", "This field may not be blank."));
        }
        if name.chars().count() > self.device_name_max {
            return Err(ControlError::validation(
                "name",
                format!(
                    "Ensure this field has no more than {} characters.",
                    self.device_name_max
                ),
            ));
        }

        Ok(name.to_string())
    }
}
