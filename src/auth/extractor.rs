// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a live session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! `AdminOnly` additionally requires the admin flag on the user record.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::WalletAddress;
use crate::state::AppState;

use super::error::AuthError;

/// The authenticated caller of a request.
///
/// The admin flag is read from the user record on every request rather than
/// frozen into the session, so privilege changes take effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID.
    pub user_id: String,
    /// Wallet address the session is bound to.
    pub wallet_address: WalletAddress,
    /// Whether the user may use the admin interface.
    pub is_admin: bool,
}

/// Extractor requiring a valid session.
#[derive(Debug)]
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let session = state
            .sessions
            .authenticate(token)
            .ok_or(AuthError::SessionNotFound)?;

        let user = state
            .db
            .get_user(&session.user_id)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            // The user may have been deleted since the session was issued
            .ok_or(AuthError::SessionNotFound)?;

        Ok(Auth(AuthenticatedUser {
            user_id: user.id,
            wallet_address: user.wallet_address,
            is_admin: user.is_admin,
        }))
    }
}

/// Extractor requiring a valid session with the admin flag set.
#[derive(Debug)]
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AuthError::AdminRequired);
        }
        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn state_with_user(is_admin: bool) -> (AppState, crate::models::User, String) {
        let state = AppState::for_tests();
        let user = crate::models::User {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_address: "0xabc".into(),
            earning_code: "CODE0001".into(),
            is_admin,
            total_earned: 0.0,
            total_withdrawn: 0.0,
            code_uses: 0,
            created_at: chrono::Utc::now(),
        };
        state.db.create_user(&user).unwrap();
        let session = state.sessions.create(&user.id, &user.wallet_address);
        (state, user, session.token)
    }

    fn parts_with_bearer(token: &str) -> Parts {
        let request = Request::builder()
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[tokio::test]
    async fn auth_resolves_session_to_user() {
        let (state, user, token) = state_with_user(false);
        let mut parts = parts_with_bearer(&token);
        let Auth(authed) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(authed.user_id, user.id);
        assert!(!authed.is_admin);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (state, _, _) = state_with_user(false);
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        let err = Auth::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingAuthHeader));
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _, token) = state_with_user(false);
        let mut parts = parts_with_bearer(&token);
        let err = AdminOnly::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AdminRequired));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let (state, user, token) = state_with_user(true);
        let mut parts = parts_with_bearer(&token);
        let AdminOnly(authed) = AdminOnly::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(authed.user_id, user.id);
    }

    #[tokio::test]
    async fn deleted_user_invalidates_session() {
        let (state, user, token) = state_with_user(false);
        state.db.delete_user(&user.id).unwrap();
        let mut parts = parts_with_bearer(&token);
        let err = Auth::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
    }
}
