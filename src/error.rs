// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Error types.
//!
//! [`CoreError`] is the domain taxonomy used by the ledger services; it maps
//! onto [`ApiError`] at the HTTP edge. Every surfaced error carries a stable
//! status plus a human-readable message, serialized as `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Domain error taxonomy for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad input shape or range; user-correctable, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Signature or identity verification failure.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Caller lacks the required privilege.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Business-rule rejection of a withdrawal request.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: f64, available: f64 },

    /// Uniqueness or state-transition collision; caller may retry as lookup.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure that survived bounded internal retries.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Settlement interrupted after the `processing` transition; the request
    /// stays recoverable and is picked up by the reconciliation sweep.
    #[error("settlement incomplete for request {request_id}: {reason}")]
    IncompleteSettlement { request_id: String, reason: String },
}

impl CoreError {
    /// Whether an internal retry is worthwhile before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => ApiError::bad_request(message),
            CoreError::Authentication(_) => ApiError::unauthorized(message),
            CoreError::Authorization(_) => ApiError::forbidden(message),
            CoreError::NotFound(_) => ApiError::not_found(message),
            CoreError::InsufficientBalance { .. } => ApiError::unprocessable(message),
            CoreError::Conflict(_) => ApiError::conflict(message),
            CoreError::Transient(_) => ApiError::new(StatusCode::SERVICE_UNAVAILABLE, message),
            CoreError::IncompleteSettlement { .. } => ApiError::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
