//! API error types and responses.
//!
//! This module defines the standard error format for all API responses:
//!
//! ```text
//! { "error": { "code": "validation_error", "message": "...", "field": "name" } }
//! ```

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use fleet_control::ControlError;
use fleet_core::CoreError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request field failed validation.
    #[error("{message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// The requested status change is not allowed.
    #[error("{0}")]
    InvalidTransition(String),

    /// Malformed request body or path.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent request held the same rows, even after a retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidTransition(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }

    const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                field: self.field(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Validation { field, message } => Self::Validation { field, message },
            err @ ControlError::InvalidTransition { .. } => Self::InvalidTransition(err.to_string()),
            ControlError::ServerNotFound(id) => Self::NotFound(format!("server {id}")),
            ControlError::DeviceNotFound(id) => Self::NotFound(format!("device {id}")),
            ControlError::Store(store_err) if store_err.is_conflict() => {
                tracing::warn!(error = %store_err, "Unresolved transaction conflict");
                Self::Conflict("the resource is busy, try again".to_string())
            }
            ControlError::Store(store_err) => {
                tracing::error!(error = %store_err, "Store error");
                Self::Internal("storage error".to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidId(e) => Self::BadRequest(format!("invalid identifier: {e}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
