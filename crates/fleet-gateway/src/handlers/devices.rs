//! Device endpoints.
//!
//! This module provides handlers for registering, listing and updating
//! devices. Every successful `PATCH` bumps `last_seen`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use fleet_control::{CreateDeviceRequest, Device, DevicePatch, FleetControl};
use fleet_core::DeviceId;

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::handlers::servers::ServerResponse;
use crate::state::GatewayState;

/// Response for a single device.
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    /// Device ID.
    pub id: DeviceId,
    /// Display name.
    pub name: String,
    /// Whether the device is online.
    pub is_online: bool,
    /// Last time the device was touched.
    pub last_seen: DateTime<Utc>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.device_id,
            name: device.name,
            is_online: device.is_online,
            last_seen: device.last_seen,
        }
    }
}

/// List all devices.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list_devices<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let devices = state.control.list_devices().await?;

    Ok(Json(
        devices
            .into_iter()
            .map(DeviceResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Register a new device.
///
/// # Errors
///
/// Returns an error if the body is malformed or the name is invalid.
pub async fn create_device<C>(
    State(state): State<Arc<GatewayState<C>>>,
    body: Result<Json<CreateDeviceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let Json(request) = body?;
    let device = state.control.create_device(request).await?;

    Ok((StatusCode::CREATED, Json(DeviceResponse::from(device))))
}

/// Get a single device by ID.
///
/// # Errors
///
/// Returns an error if the ID is malformed or the device does not exist.
pub async fn get_device<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let device_id: DeviceId = parse_id(&device_id)?;
    let device = state.control.get_device(&device_id).await?;

    Ok(Json(DeviceResponse::from(device)))
}

/// Update a device's name and/or online flag.
///
/// # Errors
///
/// Returns an error if the name is invalid or the device does not exist.
pub async fn update_device<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(device_id): Path<String>,
    body: Result<Json<DevicePatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let device_id: DeviceId = parse_id(&device_id)?;
    let Json(patch) = body?;
    let device = state.control.update_device(&device_id, patch).await?;

    Ok(Json(DeviceResponse::from(device)))
}

/// List the servers currently running on a device.
///
/// # Errors
///
/// Returns an error if the device does not exist.
pub async fn list_device_servers<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let device_id: DeviceId = parse_id(&device_id)?;
    let servers = state.control.list_device_servers(&device_id).await?;

    Ok(Json(
        servers
            .into_iter()
            .map(ServerResponse::from)
            .collect::<Vec<_>>(),
    ))
}
