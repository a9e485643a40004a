//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use fleet_control::FleetControl;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<C>
where
    C: FleetControl,
{
    /// The fleet control service.
    pub control: Arc<C>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C> GatewayState<C>
where
    C: FleetControl,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(control: Arc<C>, config: GatewayConfig) -> Self {
        Self { control, config }
    }
}

impl<C> Clone for GatewayState<C>
where
    C: FleetControl,
{
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            config: self.config.clone(),
        }
    }
}
