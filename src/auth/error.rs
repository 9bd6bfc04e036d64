// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Covers challenge verification at sign-in and session checks on every
/// authenticated request.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Session token is unknown or was revoked
    SessionNotFound,
    /// Session has expired
    SessionExpired,
    /// Challenge message does not have the expected shape
    MalformedMessage,
    /// Signature bytes could not be parsed
    MalformedSignature,
    /// Challenge timestamp is outside the freshness window
    StaleChallenge,
    /// Challenge nonce was never issued or was already consumed
    UnknownChallenge,
    /// Recovered signer does not match the claimed address
    AddressMismatch,
    /// Caller is not an administrator
    AdminRequired,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::SessionExpired => "session_expired",
            AuthError::MalformedMessage => "malformed_message",
            AuthError::MalformedSignature => "malformed_signature",
            AuthError::StaleChallenge => "stale_challenge",
            AuthError::UnknownChallenge => "unknown_challenge",
            AuthError::AddressMismatch => "address_mismatch",
            AuthError::AdminRequired => "admin_required",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::MalformedMessage
            | AuthError::MalformedSignature
            | AuthError::StaleChallenge
            | AuthError::UnknownChallenge
            | AuthError::AddressMismatch => StatusCode::UNAUTHORIZED,
            AuthError::AdminRequired => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::SessionNotFound => write!(f, "Session not found"),
            AuthError::SessionExpired => write!(f, "Session has expired"),
            AuthError::MalformedMessage => write!(f, "Challenge message is malformed"),
            AuthError::MalformedSignature => write!(f, "Signature is malformed"),
            AuthError::StaleChallenge => write!(f, "Challenge has expired, request a new one"),
            AuthError::UnknownChallenge => {
                write!(f, "Challenge was not issued or has already been used")
            }
            AuthError::AddressMismatch => {
                write!(f, "Signature does not match the claimed wallet address")
            }
            AuthError::AdminRequired => write!(f, "Admin privileges are required"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
