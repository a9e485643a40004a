//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary device records, keyed by `device_id`.
    pub const DEVICES: &str = "devices";

    /// Index: online devices ordered by last touch, keyed by
    /// `last_seen || device_id`. Offline devices have no entry.
    pub const DEVICES_BY_LAST_SEEN: &str = "devices_by_last_seen";

    /// Primary server records, keyed by `server_id`.
    pub const SERVERS: &str = "servers";

    /// Unique index: server by lower-cased subdomain, value is `server_id`.
    pub const SERVERS_BY_SUBDOMAIN: &str = "servers_by_subdomain";

    /// Index: running servers by device, keyed by `device_id || server_id`.
    pub const SERVERS_BY_DEVICE: &str = "servers_by_device";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::DEVICES,
        cf::DEVICES_BY_LAST_SEEN,
        cf::SERVERS,
        cf::SERVERS_BY_SUBDOMAIN,
        cf::SERVERS_BY_DEVICE,
    ]
}
