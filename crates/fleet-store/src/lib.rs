//! `RocksDB` storage layer for the device fleet.
//!
//! This crate provides transactional storage for devices and servers using a
//! `RocksDB` `TransactionDB` with column families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `devices`: Primary device records, keyed by `device_id`
//! - `devices_by_last_seen`: Online devices in least-recently-touched order
//! - `servers`: Primary server records, keyed by `server_id`
//! - `servers_by_subdomain`: Unique subdomain index
//! - `servers_by_device`: Index for listing running servers by device
//!
//! Every write goes through a [`StoreTxn`]. Row locks are pessimistic; a
//! lock held by another transaction surfaces as [`StoreError::Conflict`],
//! except through [`StoreTxn::try_lock_device`], which skips the row instead.
//!
//! # Example
//!
//! ```no_run
//! use fleet_store::{Device, RocksStore, Store, StoreTxn};
//!
//! let store = RocksStore::open("/tmp/fleet-db").unwrap();
//!
//! let txn = store.begin().unwrap();
//! txn.put_device(&Device::new("edge-1", true, chrono::Utc::now())).unwrap();
//! txn.commit().unwrap();
//!
//! let devices = store.list_devices().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::{RocksStore, RocksTxn, StoreOptions};
pub use types::{Device, DeviceCandidate, Server, ServerState, ServerStatus};

use fleet_core::{DeviceId, ServerId};

/// Online devices yielded lazily from the last-seen index.
pub type Candidates<'t> = Box<dyn Iterator<Item = Result<DeviceCandidate>> + 't>;

/// The storage trait defining read operations and the transaction entry point.
///
/// This trait abstracts the storage layer, allowing for different implementations.
/// Reads through `Store` see committed data only and take no locks.
pub trait Store: Send + Sync {
    /// The transaction type handed out by [`Store::begin`].
    type Txn<'a>: StoreTxn
    where
        Self: 'a;

    /// Begin a new transaction.
    ///
    /// Dropping the transaction without calling [`StoreTxn::commit`] rolls it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot start a transaction.
    fn begin(&self) -> Result<Self::Txn<'_>>;

    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Get a device by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_device(&self, device_id: &DeviceId) -> Result<Option<Device>>;

    /// List all devices in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_devices(&self) -> Result<Vec<Device>>;

    // =========================================================================
    // Server Operations
    // =========================================================================

    /// Get a server by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_server(&self, server_id: &ServerId) -> Result<Option<Server>>;

    /// List all servers in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_servers(&self) -> Result<Vec<Server>>;

    /// List the servers currently bound to a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_servers_by_device(&self, device_id: &DeviceId) -> Result<Vec<Server>>;
}

/// A single atomic unit of work against the store.
///
/// Reads made through a transaction observe its own uncommitted writes.
/// Writes maintain every secondary index in the same transaction.
pub trait StoreTxn: Sized {
    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Read a device and lock its row until commit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another transaction holds the row.
    fn get_device_for_update(&self, device_id: &DeviceId) -> Result<Option<Device>>;

    /// Try to lock a device row without waiting.
    ///
    /// Returns `Ok(None)` when the row is held by another transaction or the
    /// device does not exist, so callers can move on to the next candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn try_lock_device(&self, device_id: &DeviceId) -> Result<Option<Device>>;

    /// Walk online devices, least-recently-touched first.
    ///
    /// The iterator reads a consistent view taken when it is created; a
    /// candidate's row may have changed by the time it is locked.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn online_devices_by_last_seen(&self) -> Result<Candidates<'_>>;

    /// Insert or update a device record.
    ///
    /// This also maintains the last-seen index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_device(&self, device: &Device) -> Result<()>;

    // =========================================================================
    // Server Operations
    // =========================================================================

    /// Read a server and lock its row until commit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another transaction holds the row.
    fn get_server_for_update(&self, server_id: &ServerId) -> Result<Option<Server>>;

    /// Look up which server owns a subdomain without locking the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn subdomain_owner(&self, subdomain: &str) -> Result<Option<ServerId>>;

    /// Look up which server owns a subdomain, locking the index entry.
    ///
    /// The lock is taken even when no server owns the subdomain, so a
    /// concurrent transaction cannot claim it before this one commits.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another transaction holds the entry.
    fn lock_subdomain(&self, subdomain: &str) -> Result<Option<ServerId>>;

    /// Insert or update a server record.
    ///
    /// This also maintains the subdomain and device indexes. The subdomain
    /// entry is locked and rewritten only when the subdomain changes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the subdomain belongs to another server.
    fn put_server(&self, server: &Server) -> Result<()>;

    /// Commit all writes atomically and release every lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is written in that case.
    fn commit(self) -> Result<()>;
}
