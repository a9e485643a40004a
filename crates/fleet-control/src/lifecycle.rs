//! Server lifecycle state machine.
//!
//! This module defines the legal status transitions for servers and applies
//! a requested transition, including device allocation, inside a store
//! transaction.
//!
//! # State Machine
//!
//! ```text
//!          ┌──────────┐  start   ┌──────────┐
//!          │ Stopped  │─────────▶│ Starting │
//!          └──────────┘          └────┬─────┘
//!               ▲           device    │     no device
//!               │ stop     ┌──────────┴──────────┐
//!               │          ▼                     ▼
//!          ┌──────────┐                     ┌──────────┐
//!          │ Running  │                     │  Error   │
//!          └──────────┘                     └────┬─────┘
//!                                                │ retry
//!                                                ▼
//!                                           (Starting)
//! ```
//!
//! A request for `starting` never persists as `starting`: allocation runs in
//! the same transaction and resolves it to `running` or `error`.

use chrono::{DateTime, Utc};
use fleet_core::ServerId;
use fleet_store::{Server, ServerState, ServerStatus, StoreTxn};

use crate::allocator::{self, Allocation};
use crate::error::{ControlError, Result};

/// Check if `requested` is one edge away from `current` in the transition table.
///
/// Same-status requests are not edges; see [`validate_transition`].
#[must_use]
pub const fn is_allowed(current: ServerStatus, requested: ServerStatus) -> bool {
    use ServerStatus::{Error, Running, Starting, Stopped};

    matches!(
        (current, requested),
        (Stopped | Error, Starting) | (Starting, Running | Error) | (Running, Stopped)
    )
}

/// Validates a requested status against the current one.
///
/// Requesting the current status is a no-op and always succeeds.
///
/// # Errors
///
/// Returns `ControlError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(
    server_id: &ServerId,
    current: ServerStatus,
    requested: ServerStatus,
) -> Result<()> {
    if current == requested || is_allowed(current, requested) {
        Ok(())
    } else {
        Err(ControlError::InvalidTransition {
            server_id: *server_id,
            from: current,
            to: requested,
        })
    }
}

/// Returns the list of valid target statuses from the given status.
#[must_use]
pub fn valid_transitions_from(status: ServerStatus) -> Vec<ServerStatus> {
    use ServerStatus::{Error, Running, Starting, Stopped};

    match status {
        Stopped | Error => vec![Starting],
        Starting => vec![Running, Error],
        Running => vec![Stopped],
    }
}

/// Validate and apply a requested status to `server`, inside `txn`.
///
/// Validation runs before any allocation. The caller persists the updated
/// server in the same transaction.
///
/// # Errors
///
/// Returns `ControlError::InvalidTransition` if the transition is not allowed,
/// or a store error if allocation fails at the database level.
pub fn apply_transition<T: StoreTxn>(
    txn: &T,
    server: &mut Server,
    requested: ServerStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let current = server.status();
    validate_transition(&server.server_id, current, requested)?;

    if current == requested {
        return Ok(());
    }

    server.state = match requested {
        // Running needs a device, so reaching it from Starting allocates too
        ServerStatus::Starting | ServerStatus::Running => match allocator::allocate(txn, now)? {
            Allocation::Bound(device) => ServerState::Running {
                device_id: device.device_id,
            },
            Allocation::Exhausted => {
                tracing::warn!(server_id = %server.server_id, "No online device available");
                ServerState::Error
            }
        },
        ServerStatus::Stopped => ServerState::Stopped,
        ServerStatus::Error => ServerState::Error,
    };

    tracing::info!(
        server_id = %server.server_id,
        from = %current,
        requested = %requested,
        to = %server.status(),
        device_id = ?server.device_id(),
        "Applied server transition"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_store::{Device, RocksStore, Store};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn server_in(state: ServerState) -> Server {
        Server {
            server_id: ServerId::generate(),
            name: "GameServer".to_string(),
            subdomain: "gameserver".to_string(),
            state,
            created_at: Utc::now(),
        }
    }

    fn online_device(store: &RocksStore) -> Device {
        let device = Device::new("edge", true, Utc::now());
        let txn = store.begin().unwrap();
        txn.put_device(&device).unwrap();
        txn.commit().unwrap();
        device
    }

    #[test]
    fn table_edges() {
        use ServerStatus::*;

        assert!(is_allowed(Stopped, Starting));
        assert!(is_allowed(Starting, Running));
        assert!(is_allowed(Starting, Error));
        assert!(is_allowed(Running, Stopped));
        assert!(is_allowed(Error, Starting));
    }

    #[test]
    fn table_matches_valid_transitions_from() {
        for from in ServerStatus::ALL {
            for to in ServerStatus::ALL {
                assert_eq!(
                    is_allowed(from, to),
                    valid_transitions_from(from).contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn invalid_transitions() {
        use ServerStatus::*;

        assert!(!is_allowed(Running, Error));
        assert!(!is_allowed(Running, Starting));
        assert!(!is_allowed(Stopped, Running));
        assert!(!is_allowed(Stopped, Error));
        assert!(!is_allowed(Error, Stopped));
        assert!(!is_allowed(Error, Running));
    }

    #[test]
    fn same_status_is_a_no_op() {
        let server_id = ServerId::generate();
        for status in ServerStatus::ALL {
            assert!(validate_transition(&server_id, status, status).is_ok());
        }
    }

    #[test]
    fn validate_transition_err() {
        let server_id = ServerId::generate();
        let result = validate_transition(&server_id, ServerStatus::Running, ServerStatus::Error);

        match result {
            Err(ControlError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, ServerStatus::Running);
                assert_eq!(to, ServerStatus::Error);
            }
            _ => panic!("expected InvalidTransition error"),
        }
    }

    #[test]
    fn rejected_transition_leaves_server_and_devices_alone() {
        let (store, _dir) = create_test_store();
        let device = online_device(&store);
        let state = ServerState::Running {
            device_id: device.device_id,
        };
        let mut server = server_in(state);

        let txn = store.begin().unwrap();
        let result = apply_transition(&txn, &mut server, ServerStatus::Starting, Utc::now());
        assert!(matches!(result, Err(ControlError::InvalidTransition { .. })));
        assert_eq!(server.state, state);

        // No allocation happened, so the device is still free to lock elsewhere
        let other = store.begin().unwrap();
        assert!(other.try_lock_device(&device.device_id).unwrap().is_some());
    }

    #[test]
    fn start_binds_device() {
        let (store, _dir) = create_test_store();
        let device = online_device(&store);
        let mut server = server_in(ServerState::Stopped);

        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Starting, Utc::now()).unwrap();
        assert_eq!(server.status(), ServerStatus::Running);
        assert_eq!(server.device_id(), Some(device.device_id));
    }

    #[test]
    fn start_without_devices_errors() {
        let (store, _dir) = create_test_store();
        let mut server = server_in(ServerState::Stopped);

        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Starting, Utc::now()).unwrap();
        assert_eq!(server.state, ServerState::Error);
    }

    #[test]
    fn retry_from_error_binds_device() {
        let (store, _dir) = create_test_store();
        let device = online_device(&store);
        let mut server = server_in(ServerState::Error);

        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Starting, Utc::now()).unwrap();
        assert_eq!(server.device_id(), Some(device.device_id));
    }

    #[test]
    fn stop_clears_device() {
        let (store, _dir) = create_test_store();
        let mut server = server_in(ServerState::Running {
            device_id: fleet_core::DeviceId::generate(),
        });

        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Stopped, Utc::now()).unwrap();
        assert_eq!(server.state, ServerState::Stopped);
        assert_eq!(server.device_id(), None);
    }

    #[test]
    fn running_no_op_keeps_device() {
        let (store, _dir) = create_test_store();
        let device_id = fleet_core::DeviceId::generate();
        let mut server = server_in(ServerState::Running { device_id });

        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Running, Utc::now()).unwrap();
        assert_eq!(server.device_id(), Some(device_id));
    }

    #[test]
    fn starting_resolves_to_running_or_error() {
        let (store, _dir) = create_test_store();

        let mut server = server_in(ServerState::Starting);
        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Running, Utc::now()).unwrap();
        assert_eq!(server.state, ServerState::Error);
        drop(txn);

        let device = online_device(&store);
        let mut server = server_in(ServerState::Starting);
        let txn = store.begin().unwrap();
        apply_transition(&txn, &mut server, ServerStatus::Running, Utc::now()).unwrap();
        assert_eq!(server.device_id(), Some(device.device_id));

        let mut server = server_in(ServerState::Starting);
        apply_transition(&txn, &mut server, ServerStatus::Error, Utc::now()).unwrap();
        assert_eq!(server.state, ServerState::Error);
    }

    #[test]
    fn device_present_iff_running_after_every_transition() {
        let (store, _dir) = create_test_store();
        online_device(&store);
        let states = [
            ServerState::Stopped,
            ServerState::Starting,
            ServerState::Running {
                device_id: fleet_core::DeviceId::generate(),
            },
            ServerState::Error,
        ];

        for state in states {
            for requested in ServerStatus::ALL {
                let txn = store.begin().unwrap();
                let mut server = server_in(state);
                if apply_transition(&txn, &mut server, requested, Utc::now()).is_ok() {
                    assert_eq!(
                        server.status() == ServerStatus::Running,
                        server.device_id().is_some()
                    );
                } else {
                    assert_eq!(server.state, state);
                }
            }
        }
    }
}
