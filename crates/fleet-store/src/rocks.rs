//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait and
//! its `RocksTxn` transaction type, built on a pessimistic `TransactionDB`.

use std::path::Path;
use std::sync::Arc;

use fleet_core::{DeviceId, ServerId};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::Deserialize;

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{Device, DeviceCandidate, Server};
use crate::{Candidates, Store, StoreTxn};

type Db = TransactionDB<MultiThreaded>;

/// Tunables for the `RocksDB` store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreOptions {
    /// How long a transaction waits for a row lock, in milliseconds.
    ///
    /// `0` fails immediately when the row is held elsewhere.
    #[serde(default)]
    pub lock_timeout_ms: i64,
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    options: StoreOptions,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open or create a database with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            cf_descriptors,
        )?;

        Ok(Self {
            db: Arc::new(db),
            options,
        })
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Scan a whole column family of CBOR records.
    fn list_cf<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = cf_handle(&self.db, name)?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(Self::deserialize(&value)?);
        }

        Ok(records)
    }
}

/// Get a column family handle.
fn cf_handle<'a>(db: &'a Db, name: &str) -> Result<Arc<BoundColumnFamily<'a>>> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
}

/// Returns true if the error means a row lock is held by another transaction.
fn is_lock_contention(e: &rocksdb::Error) -> bool {
    matches!(e.kind(), ErrorKind::Busy | ErrorKind::TimedOut)
}

impl Store for RocksStore {
    type Txn<'a> = RocksTxn<'a>;

    fn begin(&self) -> Result<RocksTxn<'_>> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(self.options.lock_timeout_ms);

        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
        Ok(RocksTxn { db: &self.db, txn })
    }

    // =========================================================================
    // Device Operations
    // =========================================================================

    fn get_device(&self, device_id: &DeviceId) -> Result<Option<Device>> {
        let cf = cf_handle(&self.db, cf::DEVICES)?;
        let key = keys::device_key(device_id);

        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        self.list_cf(cf::DEVICES)
    }

    // =========================================================================
    // Server Operations
    // =========================================================================

    fn get_server(&self, server_id: &ServerId) -> Result<Option<Server>> {
        let cf = cf_handle(&self.db, cf::SERVERS)?;
        let key = keys::server_key(server_id);

        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_servers(&self) -> Result<Vec<Server>> {
        self.list_cf(cf::SERVERS)
    }

    fn list_servers_by_device(&self, device_id: &DeviceId) -> Result<Vec<Server>> {
        let cf_by_device = cf_handle(&self.db, cf::SERVERS_BY_DEVICE)?;
        let prefix = keys::device_prefix(device_id);

        let mut servers = Vec::new();
        let iter = self.db.iterator_cf(
            &cf_by_device,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        for item in iter {
            let (key, _) = item?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            let server_id = keys::extract_server_id_from_device_server_key(&key);
            if let Some(server) = self.get_server(&server_id)? {
                servers.push(server);
            }
        }

        Ok(servers)
    }
}

/// A transaction against a [`RocksStore`].
pub struct RocksTxn<'a> {
    db: &'a Db,
    txn: Transaction<'a, Db>,
}

impl<'a> RocksTxn<'a> {
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'a>>> {
        cf_handle(self.db, name)
    }

    /// Read a record through the transaction without locking it.
    fn read<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.txn
            .get_cf(&cf, key)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    /// Read a record through the transaction and lock it exclusively.
    fn read_for_update<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.txn
            .get_for_update_cf(&cf, key, true)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }
}

impl StoreTxn for RocksTxn<'_> {
    // =========================================================================
    // Device Operations
    // =========================================================================

    fn get_device_for_update(&self, device_id: &DeviceId) -> Result<Option<Device>> {
        self.read_for_update(cf::DEVICES, &keys::device_key(device_id))
    }

    fn try_lock_device(&self, device_id: &DeviceId) -> Result<Option<Device>> {
        let cf = self.cf(cf::DEVICES)?;
        let key = keys::device_key(device_id);

        match self.txn.get_for_update_cf(&cf, key, true) {
            Ok(data) => data.map(|d| RocksStore::deserialize(&d)).transpose(),
            Err(e) if is_lock_contention(&e) => {
                tracing::trace!(device_id = %device_id, "Device row locked elsewhere, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn online_devices_by_last_seen(&self) -> Result<Candidates<'_>> {
        let cf = self.cf(cf::DEVICES_BY_LAST_SEEN)?;

        let candidates = self
            .txn
            .iterator_cf(&cf, IteratorMode::Start)
            .filter_map(|item| {
                let key = match item {
                    Ok((key, _)) => key,
                    Err(e) => return Some(Err(StoreError::from(e))),
                };

                let last_seen = keys::extract_last_seen_from_last_seen_key(&key)
                    .filter(|_| key.len() == keys::LAST_SEEN_KEY_LEN);
                let Some(last_seen) = last_seen else {
                    tracing::warn!(key_len = key.len(), "Skipping malformed last-seen index entry");
                    return None;
                };

                Some(Ok(DeviceCandidate {
                    device_id: keys::extract_device_id_from_last_seen_key(&key),
                    last_seen,
                }))
            });

        Ok(Box::new(candidates))
    }

    fn put_device(&self, device: &Device) -> Result<()> {
        let cf_devices = self.cf(cf::DEVICES)?;
        let cf_by_last_seen = self.cf(cf::DEVICES_BY_LAST_SEEN)?;

        let device_key = keys::device_key(&device.device_id);
        let value = RocksStore::serialize(device)?;

        // Drop the previous index position, if the device was indexed
        let previous: Option<Device> = self.read(cf::DEVICES, &device_key)?;
        if let Some(old) = previous.filter(|d| d.is_online) {
            self.txn.delete_cf(
                &cf_by_last_seen,
                keys::last_seen_key(&old.last_seen, &old.device_id),
            )?;
        }

        self.txn.put_cf(&cf_devices, &device_key, &value)?;

        // Only online devices are allocation candidates
        if device.is_online {
            self.txn.put_cf(
                &cf_by_last_seen,
                keys::last_seen_key(&device.last_seen, &device.device_id),
                [],
            )?;
        }

        Ok(())
    }

    // =========================================================================
    // Server Operations
    // =========================================================================

    fn get_server_for_update(&self, server_id: &ServerId) -> Result<Option<Server>> {
        self.read_for_update(cf::SERVERS, &keys::server_key(server_id))
    }

    fn subdomain_owner(&self, subdomain: &str) -> Result<Option<ServerId>> {
        let cf = self.cf(cf::SERVERS_BY_SUBDOMAIN)?;
        let key = keys::subdomain_key(subdomain);

        Ok(self
            .txn
            .get_cf(&cf, key)?
            .and_then(|value| keys::decode_server_id(&value)))
    }

    fn lock_subdomain(&self, subdomain: &str) -> Result<Option<ServerId>> {
        let cf = self.cf(cf::SERVERS_BY_SUBDOMAIN)?;
        let key = keys::subdomain_key(subdomain);

        Ok(self
            .txn
            .get_for_update_cf(&cf, key, true)?
            .and_then(|value| keys::decode_server_id(&value)))
    }

    fn put_server(&self, server: &Server) -> Result<()> {
        let cf_servers = self.cf(cf::SERVERS)?;
        let cf_by_subdomain = self.cf(cf::SERVERS_BY_SUBDOMAIN)?;
        let cf_by_device = self.cf(cf::SERVERS_BY_DEVICE)?;

        let server_key = keys::server_key(&server.server_id);
        let subdomain_key = keys::subdomain_key(&server.subdomain);
        let value = RocksStore::serialize(server)?;

        let previous: Option<Server> = self.read(cf::SERVERS, &server_key)?;
        let old_subdomain_key = previous.as_ref().map(|old| keys::subdomain_key(&old.subdomain));

        // Status-only writes leave the subdomain entry unlocked
        if old_subdomain_key.as_ref() != Some(&subdomain_key) {
            if let Some(owner) = self.lock_subdomain(&server.subdomain)? {
                if owner != server.server_id {
                    return Err(StoreError::Conflict(format!(
                        "subdomain already taken: {}",
                        server.subdomain
                    )));
                }
            }

            if let Some(old_key) = &old_subdomain_key {
                self.txn.delete_cf(&cf_by_subdomain, old_key)?;
            }
            self.txn
                .put_cf(&cf_by_subdomain, &subdomain_key, server.server_id.as_bytes())?;
        }

        if let Some(old) = &previous {
            if let Some(old_device) = old.device_id() {
                if server.device_id() != Some(old_device) {
                    self.txn.delete_cf(
                        &cf_by_device,
                        keys::device_server_key(&old_device, &old.server_id),
                    )?;
                }
            }
        }

        self.txn.put_cf(&cf_servers, &server_key, &value)?;

        if let Some(device_id) = server.device_id() {
            self.txn.put_cf(
                &cf_by_device,
                keys::device_server_key(&device_id, &server.server_id),
                [],
            )?;
        }

        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerState;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn create_test_server(name: &str, subdomain: &str) -> Server {
        Server {
            server_id: ServerId::generate(),
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            state: ServerState::Stopped,
            created_at: Utc::now(),
        }
    }

    fn insert_device(store: &RocksStore, device: &Device) {
        let txn = store.begin().unwrap();
        txn.put_device(device).unwrap();
        txn.commit().unwrap();
    }

    fn insert_server(store: &RocksStore, server: &Server) {
        let txn = store.begin().unwrap();
        txn.put_server(server).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn device_crud() {
        let (store, _dir) = create_test_store();
        let device = Device::new("edge-1", true, Utc::now());

        // Create
        insert_device(&store, &device);

        // Read
        let retrieved = store.get_device(&device.device_id).unwrap().unwrap();
        assert_eq!(retrieved, device);

        // Update
        let txn = store.begin().unwrap();
        let mut locked = txn.get_device_for_update(&device.device_id).unwrap().unwrap();
        locked.name = "edge-renamed".to_string();
        txn.put_device(&locked).unwrap();
        txn.commit().unwrap();

        let updated = store.get_device(&device.device_id).unwrap().unwrap();
        assert_eq!(updated.name, "edge-renamed");
        assert_eq!(store.list_devices().unwrap().len(), 1);
    }

    #[test]
    fn uncommitted_writes_are_discarded() {
        let (store, _dir) = create_test_store();
        let device = Device::new("ghost", true, Utc::now());

        let txn = store.begin().unwrap();
        txn.put_device(&device).unwrap();
        drop(txn);

        assert!(store.get_device(&device.device_id).unwrap().is_none());
    }

    #[test]
    fn last_seen_index_orders_online_devices() {
        let (store, _dir) = create_test_store();
        let t0 = Utc::now();

        let newer = Device::new("newer", true, t0 + Duration::seconds(10));
        let older = Device::new("older", true, t0);
        let offline = Device::new("offline", false, t0 - Duration::seconds(10));
        insert_device(&store, &newer);
        insert_device(&store, &older);
        insert_device(&store, &offline);

        let txn = store.begin().unwrap();
        let order: Vec<_> = txn
            .online_devices_by_last_seen()
            .unwrap()
            .map(|c| c.unwrap().device_id)
            .collect();
        assert_eq!(order, vec![older.device_id, newer.device_id]);
    }

    #[test]
    fn last_seen_index_follows_updates() {
        let (store, _dir) = create_test_store();
        let t0 = Utc::now();

        let mut first = Device::new("first", true, t0);
        let second = Device::new("second", true, t0 + Duration::seconds(1));
        insert_device(&store, &first);
        insert_device(&store, &second);

        // Touching the oldest device moves it to the back of the queue
        first.touch(t0 + Duration::seconds(2));
        insert_device(&store, &first);

        let txn = store.begin().unwrap();
        let candidates: Vec<_> = txn
            .online_devices_by_last_seen()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].device_id, second.device_id);
        assert_eq!(candidates[1].device_id, first.device_id);
        assert_eq!(candidates[1].last_seen, first.last_seen);
        drop(txn);

        // Going offline removes the index entry
        first.is_online = false;
        insert_device(&store, &first);
        let txn = store.begin().unwrap();
        let candidates: Vec<_> = txn
            .online_devices_by_last_seen()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].device_id, second.device_id);
    }

    #[test]
    fn try_lock_device_skips_rows_held_elsewhere() {
        let (store, _dir) = create_test_store();
        let device = Device::new("contended", true, Utc::now());
        insert_device(&store, &device);

        let holder = store.begin().unwrap();
        assert!(holder
            .get_device_for_update(&device.device_id)
            .unwrap()
            .is_some());

        let contender = store.begin().unwrap();
        assert!(contender
            .try_lock_device(&device.device_id)
            .unwrap()
            .is_none());
        assert!(matches!(
            contender.get_device_for_update(&device.device_id),
            Err(StoreError::Conflict(_))
        ));

        // Once the holder finishes, the row is available again
        drop(holder);
        assert!(contender
            .try_lock_device(&device.device_id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn subdomain_is_unique_case_insensitively() {
        let (store, _dir) = create_test_store();
        insert_server(&store, &create_test_server("Alpha", "alpha"));

        let txn = store.begin().unwrap();
        let clash = create_test_server("ALPHA", "Alpha");
        assert!(matches!(
            txn.put_server(&clash),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn lock_subdomain_blocks_concurrent_claims() {
        let (store, _dir) = create_test_store();

        let first = store.begin().unwrap();
        assert!(first.lock_subdomain("fresh").unwrap().is_none());

        let second = store.begin().unwrap();
        assert!(matches!(
            second.lock_subdomain("fresh"),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn subdomain_owner_takes_no_lock() {
        let (store, _dir) = create_test_store();
        let server = create_test_server("Alpha", "alpha");
        insert_server(&store, &server);

        let reader = store.begin().unwrap();
        assert_eq!(
            reader.subdomain_owner("ALPHA").unwrap(),
            Some(server.server_id)
        );
        assert!(reader.subdomain_owner("beta").unwrap().is_none());

        let writer = store.begin().unwrap();
        assert_eq!(
            writer.lock_subdomain("alpha").unwrap(),
            Some(server.server_id)
        );
    }

    #[test]
    fn status_write_leaves_subdomain_entry_alone() {
        let (store, _dir) = create_test_store();
        let device = Device::new("host", true, Utc::now());
        insert_device(&store, &device);
        let mut server = create_test_server("Alpha", "alpha");
        insert_server(&store, &server);

        // Another transaction is holding the subdomain entry
        let holder = store.begin().unwrap();
        holder.lock_subdomain("alpha").unwrap();

        server.state = ServerState::Running {
            device_id: device.device_id,
        };
        let txn = store.begin().unwrap();
        txn.get_server_for_update(&server.server_id).unwrap();
        txn.put_server(&server).unwrap();
        txn.commit().unwrap();
        drop(holder);

        let stored = store.get_server(&server.server_id).unwrap().unwrap();
        assert_eq!(stored.device_id(), Some(device.device_id));

        let txn = store.begin().unwrap();
        assert_eq!(
            txn.lock_subdomain("alpha").unwrap(),
            Some(server.server_id)
        );
    }

    #[test]
    fn renaming_to_held_subdomain_conflicts() {
        let (store, _dir) = create_test_store();
        let mut server = create_test_server("Alpha", "alpha");
        insert_server(&store, &server);

        let holder = store.begin().unwrap();
        assert!(holder.lock_subdomain("beta").unwrap().is_none());

        server.subdomain = "beta".to_string();
        let txn = store.begin().unwrap();
        assert!(matches!(
            txn.put_server(&server),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn renaming_releases_old_subdomain() {
        let (store, _dir) = create_test_store();
        let mut server = create_test_server("Old", "old");
        insert_server(&store, &server);

        server.subdomain = "new".to_string();
        insert_server(&store, &server);

        let txn = store.begin().unwrap();
        assert!(txn.lock_subdomain("old").unwrap().is_none());
        assert_eq!(txn.lock_subdomain("new").unwrap(), Some(server.server_id));
    }

    #[test]
    fn device_index_tracks_running_servers() {
        let (store, _dir) = create_test_store();
        let device = Device::new("host", true, Utc::now());
        insert_device(&store, &device);

        let mut a = create_test_server("A", "a");
        let mut b = create_test_server("B", "b");
        a.state = ServerState::Running {
            device_id: device.device_id,
        };
        b.state = ServerState::Running {
            device_id: device.device_id,
        };
        insert_server(&store, &a);
        insert_server(&store, &b);
        assert_eq!(
            store.list_servers_by_device(&device.device_id).unwrap().len(),
            2
        );

        a.state = ServerState::Stopped;
        insert_server(&store, &a);
        let bound = store.list_servers_by_device(&device.device_id).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].server_id, b.server_id);
    }

    #[test]
    fn list_servers_in_creation_order() {
        let (store, _dir) = create_test_store();
        let one = create_test_server("One", "one");
        let two = create_test_server("Two", "two");
        insert_server(&store, &two);
        insert_server(&store, &one);

        let names: Vec<_> = store
            .list_servers()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        // Keys are time-ordered ids, not insertion order
        let mut expected = vec![(one.server_id, "One"), (two.server_id, "Two")];
        expected.sort_by_key(|(id, _)| *id);
        let expected: Vec<_> = expected.into_iter().map(|(_, n)| n.to_string()).collect();
        assert_eq!(names, expected);
    }
}
