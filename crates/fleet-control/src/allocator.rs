//! Device allocation for servers entering `starting`.
//!
//! Online devices are tried least-recently-touched first. Rows locked by a
//! concurrent transaction are skipped rather than waited on, so two racing
//! starts never block each other; each takes the best device still free or
//! falls through to [`Allocation::Exhausted`]. Devices are shared: a device
//! already hosting running servers stays eligible.

use chrono::{DateTime, Utc};
use fleet_store::{Device, StoreTxn};

use crate::error::Result;

/// Outcome of an allocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// A device was chosen and its `last_seen` bumped inside the transaction.
    Bound(Device),
    /// No online device could be locked.
    Exhausted,
}

impl Allocation {
    /// The bound device, if any.
    #[must_use]
    pub const fn device(&self) -> Option<&Device> {
        match self {
            Self::Bound(device) => Some(device),
            Self::Exhausted => None,
        }
    }
}

/// Pick an online device and touch it, all inside `txn`.
///
/// # Errors
///
/// Returns an error if the database operation fails. An empty candidate set
/// is not an error.
pub fn allocate<T: StoreTxn>(txn: &T, now: DateTime<Utc>) -> Result<Allocation> {
    let Some(mut device) = claim_candidate(txn)? else {
        return Ok(Allocation::Exhausted);
    };

    device.touch(now);
    txn.put_device(&device)?;

    tracing::debug!(
        device_id = %device.device_id,
        last_seen = %device.last_seen,
        "Allocated device"
    );
    Ok(Allocation::Bound(device))
}

/// Lock the first online device the last-seen index yields.
///
/// The index is walked lazily and released before the caller writes.
fn claim_candidate<T: StoreTxn>(txn: &T) -> Result<Option<Device>> {
    for candidate in txn.online_devices_by_last_seen()? {
        let candidate = candidate?;
        let Some(device) = txn.try_lock_device(&candidate.device_id)? else {
            tracing::debug!(device_id = %candidate.device_id, "Device busy, trying next candidate");
            continue;
        };

        // A commit that landed after the scan may have moved or disabled the
        // row. The locked row is authoritative; only its online flag matters.
        if !device.is_online {
            tracing::debug!(device_id = %device.device_id, "Device went offline, skipping");
            continue;
        }

        return Ok(Some(device));
    }

    Ok(None)
}
