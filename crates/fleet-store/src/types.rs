//! Domain types stored in the database.
//!
//! These types represent the persisted state of devices and servers.

use std::fmt;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use fleet_core::{DeviceId, ServerId};
use serde::{Deserialize, Serialize};

/// A device record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier for the device.
    pub device_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Whether the device currently reports itself online.
    pub is_online: bool,
    /// Last time the device was touched (any update or assignment).
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Create a new device record seen at `now`.
    ///
    /// Timestamps are kept at microsecond precision, the resolution of the
    /// last-seen index.
    #[must_use]
    pub fn new(name: impl Into<String>, is_online: bool, now: DateTime<Utc>) -> Self {
        Self {
            device_id: DeviceId::generate(),
            name: name.into(),
            is_online,
            last_seen: now.trunc_subsecs(6),
        }
    }

    /// Advance `last_seen` to `now`.
    ///
    /// The timestamp always moves forward by at least one microsecond so that
    /// a touched device sorts strictly behind its previous position.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.last_seen + Duration::microseconds(1);
        self.last_seen = now.trunc_subsecs(6).max(floor);
    }
}

/// A server record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Unique identifier for the server.
    pub server_id: ServerId,
    /// Human-chosen name.
    pub name: String,
    /// Unique URL-safe slug derived from `name`.
    pub subdomain: String,
    /// Current lifecycle state, including the device binding when running.
    pub state: ServerState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Server {
    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.state.status()
    }

    /// Device this server is bound to, if running.
    #[must_use]
    pub const fn device_id(&self) -> Option<DeviceId> {
        self.state.device_id()
    }
}

/// An online device found in the last-seen index, oldest touch first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// The candidate device.
    pub device_id: DeviceId,
    /// The `last_seen` value recorded in the index entry.
    pub last_seen: DateTime<Utc>,
}

/// Lifecycle status of a server, without any attached data.
///
/// This is the vocabulary clients use to request transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Not running; initial status.
    Stopped,
    /// Requested to start; resolves to `Running` or `Error`.
    Starting,
    /// Running on a device.
    Running,
    /// Start failed.
    Error,
}

impl ServerStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 4] = [Self::Stopped, Self::Starting, Self::Running, Self::Error];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a server.
///
/// The device binding only exists inside `Running`, so a stopped or failed
/// server can never carry a device reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Not running.
    #[default]
    Stopped,
    /// Start requested, not yet resolved.
    Starting,
    /// Running on the given device.
    Running {
        /// Device the server is bound to.
        device_id: DeviceId,
    },
    /// Start failed.
    Error,
}

impl ServerState {
    /// The status tag of this state.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        match self {
            Self::Stopped => ServerStatus::Stopped,
            Self::Starting => ServerStatus::Starting,
            Self::Running { .. } => ServerStatus::Running,
            Self::Error => ServerStatus::Error,
        }
    }

    /// The bound device, present exactly when running.
    #[must_use]
    pub const fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::Running { device_id } => Some(*device_id),
            Self::Stopped | Self::Starting | Self::Error => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_moves_forward() {
        let t0 = Utc::now();
        let mut device = Device::new("edge-1", true, t0);

        device.touch(t0 + Duration::seconds(5));
        assert_eq!(device.last_seen, (t0 + Duration::seconds(5)).trunc_subsecs(6));
    }

    #[test]
    fn touch_never_stands_still() {
        let t0 = Utc::now();
        let mut device = Device::new("edge-1", true, t0);

        // Same or earlier clock readings still advance the timestamp
        device.touch(t0);
        assert!(device.last_seen > t0);
        let after_first = device.last_seen;
        device.touch(t0 - Duration::seconds(1));
        assert!(device.last_seen > after_first);
    }

    #[test]
    fn device_present_only_when_running() {
        let device_id = DeviceId::generate();
        assert_eq!(
            ServerState::Running { device_id }.device_id(),
            Some(device_id)
        );
        assert_eq!(ServerState::Stopped.device_id(), None);
        assert_eq!(ServerState::Starting.device_id(), None);
        assert_eq!(ServerState::Error.device_id(), None);
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&ServerStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: ServerStatus = serde_json::from_str("\"starting\"").unwrap();
        assert_eq!(parsed, ServerStatus::Starting);
        assert_eq!(ServerStatus::Error.to_string(), "error");
    }
}
