//! Server endpoints.
//!
//! This module provides handlers for creating, listing and updating servers.
//! Status changes go through `PATCH`; a requested `starting` comes back as
//! `running` or `error`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use fleet_control::{CreateServerRequest, FleetControl, Server, ServerPatch, ServerStatus};
use fleet_core::{DeviceId, ServerId};

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::GatewayState;

/// Response for a single server.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    /// Server ID.
    pub id: ServerId,
    /// Human-chosen name.
    pub name: String,
    /// Unique slug derived from the name.
    pub subdomain: String,
    /// Current status.
    pub status: ServerStatus,
    /// Bound device, present only while running.
    pub device: Option<DeviceId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Server> for ServerResponse {
    fn from(server: Server) -> Self {
        Self {
            id: server.server_id,
            status: server.status(),
            device: server.device_id(),
            name: server.name,
            subdomain: server.subdomain,
            created_at: server.created_at,
        }
    }
}

/// List all servers.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list_servers<C>(
    State(state): State<Arc<GatewayState<C>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let servers = state.control.list_servers().await?;

    Ok(Json(
        servers
            .into_iter()
            .map(ServerResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Create a new server.
///
/// # Errors
///
/// Returns an error if the body is malformed or the name is out of bounds.
pub async fn create_server<C>(
    State(state): State<Arc<GatewayState<C>>>,
    body: Result<Json<CreateServerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let Json(request) = body?;
    let server = state.control.create_server(request).await?;

    Ok((StatusCode::CREATED, Json(ServerResponse::from(server))))
}

/// Get a single server by ID.
///
/// # Errors
///
/// Returns an error if the ID is malformed or the server does not exist.
pub async fn get_server<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(server_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let server_id: ServerId = parse_id(&server_id)?;
    let server = state.control.get_server(&server_id).await?;

    Ok(Json(ServerResponse::from(server)))
}

/// Rename a server and/or request a status change.
///
/// Read-only keys in the body (`device`, `subdomain`, `created_at`, `id`) are
/// ignored.
///
/// # Errors
///
/// Returns an error if the transition is not allowed, the name is out of
/// bounds, or the server does not exist.
pub async fn update_server<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(server_id): Path<String>,
    body: Result<Json<ServerPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    C: FleetControl + 'static,
{
    let server_id: ServerId = parse_id(&server_id)?;
    let Json(patch) = body?;
    let server = state.control.update_server(&server_id, patch).await?;

    Ok(Json(ServerResponse::from(server)))
}
