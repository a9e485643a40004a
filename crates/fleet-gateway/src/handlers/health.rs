//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use fleet_control::FleetControl;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Number of registered devices, if the store could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<usize>,
}

/// Health check handler.
///
/// Reads the device list as a store probe; a failed read reports
/// `503 Service Unavailable`.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "devices": 3
/// }
/// ```
pub async fn health<C>(State(state): State<Arc<GatewayState<C>>>) -> impl IntoResponse
where
    C: FleetControl + 'static,
{
    let version = env!("CARGO_PKG_VERSION");

    match state.control.list_devices().await {
        Ok(devices) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version,
                devices: Some(devices.len()),
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    version,
                    devices: None,
                }),
            )
        }
    }
}
