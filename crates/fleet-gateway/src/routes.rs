//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use fleet_control::FleetControl;

use crate::handlers::{devices, health, servers};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Health check
///
/// ## Devices
/// - `GET /api/devices` - List devices
/// - `POST /api/devices` - Register device
/// - `GET /api/devices/:device_id` - Get device
/// - `PATCH /api/devices/:device_id` - Update device
/// - `GET /api/devices/:device_id/servers` - Servers running on the device
///
/// ## Servers
/// - `GET /api/servers` - List servers
/// - `POST /api/servers` - Create server
/// - `GET /api/servers/:server_id` - Get server
/// - `PATCH /api/servers/:server_id` - Rename and/or change status
///
/// Any other method on these paths answers `405 Method Not Allowed`.
pub fn create_router<C>(state: GatewayState<C>) -> Router
where
    C: FleetControl + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health::<C>))
        // Devices
        .route(
            "/api/devices",
            get(devices::list_devices::<C>).post(devices::create_device::<C>),
        )
        .route(
            "/api/devices/:device_id",
            get(devices::get_device::<C>).patch(devices::update_device::<C>),
        )
        .route(
            "/api/devices/:device_id/servers",
            get(devices::list_device_servers::<C>),
        )
        // Servers
        .route(
            "/api/servers",
            get(servers::list_servers::<C>).post(servers::create_server::<C>),
        )
        .route(
            "/api/servers/:server_id",
            get(servers::get_server::<C>).patch(servers::update_server::<C>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
