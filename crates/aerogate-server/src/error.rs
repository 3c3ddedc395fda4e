// crates/aerogate-server/src/error.rs
// ============================================================================
// Module: API Error Shape
// Description: Maps store and domain errors onto the `{detail}` wire shape.
// Purpose: Keep every surface failure a typed status with a readable detail.
// Dependencies: aerogate-core, axum, serde
// ============================================================================

//! ## Overview
//! Every API failure serializes as `{"detail": "..."}` with a conventional
//! status code: 404 for unknown rows, 409 for append-only and invariant
//! conflicts, 400 for malformed input, 500 otherwise. Internal error text is
//! forwarded as the detail; payload bytes never are.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aerogate_core::OrchestratorError;
use aerogate_core::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

// ============================================================================
// SECTION: Error Shape
// ============================================================================

/// Wire shape for API failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    pub detail: String,
}

/// API error with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code.
    pub status: StatusCode,
    /// Failure description.
    pub detail: String,
}

impl ApiError {
    /// Builds a 400 Bad Request.
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    /// Builds a 404 Not Found.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    /// Builds a 500 Internal Server Error.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) | StoreError::InvariantViolation { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Store(store) => store.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}
