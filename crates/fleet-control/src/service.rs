//! Control service implementation.
//!
//! This module provides the `FleetControl` trait and the `FleetService`
//! implementation that runs every write as one store transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fleet_core::{DeviceId, ServerId};
use fleet_store::{Device, Server, ServerState, Store, StoreTxn};

use crate::error::{ControlError, Result};
use crate::lifecycle;
use crate::slug;
use crate::types::{ControlConfig, CreateDeviceRequest, CreateServerRequest, DevicePatch, ServerPatch};

/// Trait defining the fleet operations.
///
/// This trait provides the complete API for managing servers and devices.
/// Neither entity can be deleted.
#[async_trait]
pub trait FleetControl: Send + Sync {
    // =========================================================================
    // Server Operations
    // =========================================================================

    /// Create a new stopped server with a freshly generated subdomain.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the name is out of bounds.
    async fn create_server(&self, request: CreateServerRequest) -> Result<Server>;

    /// Get a server by ID.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ServerNotFound` if the server doesn't exist.
    async fn get_server(&self, server_id: &ServerId) -> Result<Server>;

    /// List all servers in creation order.
    async fn list_servers(&self) -> Result<Vec<Server>>;

    /// Rename a server and/or request a status transition.
    ///
    /// A requested `starting` resolves to `running` or `error` before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidTransition` if the status change is not
    /// allowed; nothing is written in that case.
    async fn update_server(&self, server_id: &ServerId, patch: ServerPatch) -> Result<Server>;

    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Register a new device.
    async fn create_device(&self, request: CreateDeviceRequest) -> Result<Device>;

    /// Get a device by ID.
    async fn get_device(&self, device_id: &DeviceId) -> Result<Device>;

    /// List all devices in registration order.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Update a device. Always bumps `last_seen`, even for an empty patch.
    async fn update_device(&self, device_id: &DeviceId, patch: DevicePatch) -> Result<Device>;

    /// List the servers currently running on a device.
    async fn list_device_servers(&self, device_id: &DeviceId) -> Result<Vec<Server>>;
}

/// The main fleet service implementation.
pub struct FleetService<S: Store> {
    store: Arc<S>,
    config: ControlConfig,
}

impl<S: Store> FleetService<S> {
    /// Create a new fleet service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ControlConfig) -> Self {
        Self { store, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `work` in a transaction and commit it.
    ///
    /// On a transaction conflict the whole unit of work is recomputed in a
    /// fresh transaction, once.
    fn in_transaction<'s, T, F>(&'s self, operation: &'static str, mut work: F) -> Result<T>
    where
        F: FnMut(&S::Txn<'s>) -> Result<T>,
    {
        match self.run_once(&mut work) {
            Err(e) if e.is_conflict() => {
                tracing::warn!(operation, error = %e, "Transaction conflict, retrying once");
                self.run_once(&mut work)
            }
            other => other,
        }
    }

    fn run_once<'s, T, F>(&'s self, work: &mut F) -> Result<T>
    where
        F: FnMut(&S::Txn<'s>) -> Result<T>,
    {
        let txn = self.store.begin()?;
        let value = work(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    fn require_device(&self, device_id: &DeviceId) -> Result<Device> {
        self.store
            .get_device(device_id)?
            .ok_or(ControlError::DeviceNotFound(*device_id))
    }
}

#[async_trait]
impl<S: Store + 'static> FleetControl for FleetService<S> {
    // =========================================================================
    // Server Operations
    // =========================================================================

    async fn create_server(&self, request: CreateServerRequest) -> Result<Server> {
        let name = self.config.validate_server_name(&request.name)?;

        let server = self.in_transaction("create_server", |txn| {
            let server = Server {
                server_id: ServerId::generate(),
                name: name.clone(),
                subdomain: slug::generate(txn, &name, None)?,
                state: ServerState::Stopped,
                created_at: Utc::now(),
            };
            txn.put_server(&server)?;
            Ok(server)
        })?;

        tracing::info!(
            server_id = %server.server_id,
            name = %server.name,
            subdomain = %server.subdomain,
            "Created server"
        );

        Ok(server)
    }

    async fn get_server(&self, server_id: &ServerId) -> Result<Server> {
        self.store
            .get_server(server_id)?
            .ok_or(ControlError::ServerNotFound(*server_id))
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        Ok(self.store.list_servers()?)
    }

    async fn update_server(&self, server_id: &ServerId, patch: ServerPatch) -> Result<Server> {
        let name = patch
            .name
            .as_deref()
            .map(|name| self.config.validate_server_name(name))
            .transpose()?;

        self.in_transaction("update_server", |txn| {
            let mut server = txn
                .get_server_for_update(server_id)?
                .ok_or(ControlError::ServerNotFound(*server_id))?;

            // Reject a bad transition before touching anything else
            if let Some(requested) = patch.status {
                lifecycle::validate_transition(server_id, server.status(), requested)?;
            }

            if let Some(name) = name.as_ref().filter(|name| **name != server.name) {
                server.subdomain = slug::generate(txn, name, Some(server_id))?;
                server.name.clone_from(name);
                tracing::debug!(
                    server_id = %server_id,
                    subdomain = %server.subdomain,
                    "Renamed server"
                );
            }

            if let Some(requested) = patch.status {
                lifecycle::apply_transition(txn, &mut server, requested, Utc::now())?;
            }

            txn.put_server(&server)?;
            Ok(server)
        })
    }

    // =========================================================================
    // Device Operations
    // =========================================================================

    async fn create_device(&self, request: CreateDeviceRequest) -> Result<Device> {
        let name = self.config.validate_device_name(&request.name)?;

        let device = self.in_transaction("create_device", |txn| {
            let device = Device::new(name.clone(), request.is_online, Utc::now());
            txn.put_device(&device)?;
            Ok(device)
        })?;

        tracing::info!(
            device_id = %device.device_id,
            name = %device.name,
            is_online = device.is_online,
            "Registered device"
        );

        Ok(device)
    }

    async fn get_device(&self, device_id: &DeviceId) -> Result<Device> {
        self.require_device(device_id)
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.store.list_devices()?)
    }

    async fn update_device(&self, device_id: &DeviceId, patch: DevicePatch) -> Result<Device> {
        let name = patch
            .name
            .as_deref()
            .map(|name| self.config.validate_device_name(name))
            .transpose()?;

        let device = self.in_transaction("update_device", |txn| {
            let mut device = txn
                .get_device_for_update(device_id)?
                .ok_or(ControlError::DeviceNotFound(*device_id))?;

            if let Some(name) = &name {
                device.name.clone_from(name);
            }
            if let Some(is_online) = patch.is_online {
                device.is_online = is_online;
            }
            device.touch(Utc::now());

            txn.put_device(&device)?;
            Ok(device)
        })?;

        tracing::debug!(
            device_id = %device.device_id,
            is_online = device.is_online,
            "Updated device"
        );

        Ok(device)
    }

    async fn list_device_servers(&self, device_id: &DeviceId) -> Result<Vec<Server>> {
        self.require_device(device_id)?;
        Ok(self.store.list_servers_by_device(device_id)?)
    }
}
