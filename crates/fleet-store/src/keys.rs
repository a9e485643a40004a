//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for various indexes.
//! All keys are designed to support efficient prefix and ordered scans.

use chrono::{DateTime, Utc};
use fleet_core::{DeviceId, ServerId};

const TIMESTAMP_LEN: usize = 8;
const ID_LEN: usize = 16;

/// Length of a last-seen index key.
pub const LAST_SEEN_KEY_LEN: usize = TIMESTAMP_LEN + ID_LEN;

/// Encode a device key (just the device ID bytes).
#[must_use]
pub fn device_key(device_id: &DeviceId) -> Vec<u8> {
    device_id.as_bytes().to_vec()
}

/// Encode a server key (just the server ID bytes).
#[must_use]
pub fn server_key(server_id: &ServerId) -> Vec<u8> {
    server_id.as_bytes().to_vec()
}

/// Encode a timestamp so that byte order equals chronological order.
///
/// Microseconds since the epoch with the sign bit flipped, big-endian.
fn sortable_timestamp(ts: &DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    let micros = u64::from_be_bytes(ts.timestamp_micros().to_be_bytes());
    (micros ^ (1 << 63)).to_be_bytes()
}

/// Encode a last-seen index key: `last_seen || device_id`.
///
/// A forward scan over these keys yields devices least-recently-touched first.
#[must_use]
pub fn last_seen_key(last_seen: &DateTime<Utc>, device_id: &DeviceId) -> Vec<u8> {
    let mut key = Vec::with_capacity(LAST_SEEN_KEY_LEN);
    key.extend_from_slice(&sortable_timestamp(last_seen));
    key.extend_from_slice(device_id.as_bytes());
    key
}

/// Extract the device ID from a last-seen index key.
///
/// # Panics
///
/// Panics if the key is not at least 24 bytes.
#[must_use]
pub fn extract_device_id_from_last_seen_key(key: &[u8]) -> DeviceId {
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[TIMESTAMP_LEN..TIMESTAMP_LEN + ID_LEN]);
    DeviceId::from_bytes(bytes)
}

/// Extract the recorded `last_seen` from a last-seen index key.
///
/// Returns `None` if the key is too short or the timestamp is out of range.
#[must_use]
pub fn extract_last_seen_from_last_seen_key(key: &[u8]) -> Option<DateTime<Utc>> {
    let raw: [u8; TIMESTAMP_LEN] = key.get(..TIMESTAMP_LEN)?.try_into().ok()?;
    let micros = i64::from_be_bytes((u64::from_be_bytes(raw) ^ (1 << 63)).to_be_bytes());
    DateTime::from_timestamp_micros(micros)
}

/// Encode a subdomain index key.
///
/// Subdomains are unique case-insensitively, so the key is lower-cased.
#[must_use]
pub fn subdomain_key(subdomain: &str) -> Vec<u8> {
    subdomain.to_lowercase().into_bytes()
}

/// Encode a device-server index key: `device_id || server_id`.
#[must_use]
pub fn device_server_key(device_id: &DeviceId, server_id: &ServerId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(device_id.as_bytes());
    key.extend_from_slice(server_id.as_bytes());
    key
}

/// Encode a device prefix for scanning all servers bound to a device.
#[must_use]
pub fn device_prefix(device_id: &DeviceId) -> Vec<u8> {
    device_id.as_bytes().to_vec()
}

/// Extract the server ID from a device-server key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_server_id_from_device_server_key(key: &[u8]) -> ServerId {
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[ID_LEN..ID_LEN * 2]);
    ServerId::from_bytes(bytes)
}

/// Decode a server ID stored as an index value.
#[must_use]
pub fn decode_server_id(value: &[u8]) -> Option<ServerId> {
    let bytes: [u8; ID_LEN] = value.try_into().ok()?;
    Some(ServerId::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn last_seen_keys_sort_chronologically() {
        let device_a = DeviceId::generate();
        let device_b = DeviceId::generate();
        let t0 = Utc::now();

        let older = last_seen_key(&t0, &device_b);
        let newer = last_seen_key(&(t0 + Duration::microseconds(1)), &device_a);
        assert!(older < newer);

        // Pre-epoch timestamps still sort before post-epoch ones
        let ancient = DateTime::<Utc>::from_timestamp(-10, 0).unwrap();
        assert!(last_seen_key(&ancient, &device_a) < older);
    }

    #[test]
    fn last_seen_key_extracts_device_and_time() {
        let device_id = DeviceId::generate();
        let now = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_123_456).unwrap();
        let key = last_seen_key(&now, &device_id);
        assert_eq!(key.len(), LAST_SEEN_KEY_LEN);
        assert_eq!(extract_device_id_from_last_seen_key(&key), device_id);
        assert_eq!(extract_last_seen_from_last_seen_key(&key), Some(now));
    }

    #[test]
    fn device_server_key_extracts_server() {
        let device_id = DeviceId::generate();
        let server_id = ServerId::generate();

        let key = device_server_key(&device_id, &server_id);
        assert!(key.starts_with(&device_prefix(&device_id)));
        assert_eq!(extract_server_id_from_device_server_key(&key), server_id);
    }

    #[test]
    fn subdomain_key_is_case_insensitive() {
        assert_eq!(subdomain_key("My-Server"), subdomain_key("my-server"));
    }

    #[test]
    fn decode_server_id_rejects_short_values() {
        assert!(decode_server_id(&[1, 2, 3]).is_none());
        let server_id = ServerId::generate();
        assert_eq!(decode_server_id(server_id.as_bytes()), Some(server_id));
    }
}
