//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

use std::str::FromStr;

use fleet_core::{CoreError, IdError};

use crate::error::ApiError;

pub mod devices;
pub mod health;
pub mod servers;

/// Parse an identifier from a path segment.
fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::from(CoreError::from(e)))
}
