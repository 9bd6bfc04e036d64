// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Sign-in endpoints: challenge issuance, signature verification, sign-out.

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    ledger::IdentityResolver,
    models::{User, WalletAddress},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Wallet address requesting a challenge.
    pub address: WalletAddress,
}

/// A challenge message to sign with the wallet's key.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeResponse {
    /// Address the challenge is bound to (lowercase).
    pub address: WalletAddress,
    /// The exact message to sign, returned verbatim at sign-in.
    pub message: String,
    /// Seconds until the challenge expires.
    pub expires_in_secs: u64,
}

/// Sign-in request carrying the signed challenge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    /// Wallet address claiming the session.
    pub address: WalletAddress,
    /// The challenge message, exactly as issued.
    pub message: String,
    /// Hex-encoded EIP-191 signature over the message.
    pub signature: String,
}

/// A freshly issued session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    /// Opaque bearer token for the `Authorization` header.
    pub token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
    /// The signed-in user's record.
    pub user: User,
}

#[utoipa::path(
    get,
    path = "/v1/auth/challenge",
    params(ChallengeQuery),
    tag = "Auth",
    responses((status = 200, body = ChallengeResponse))
)]
pub async fn challenge(
    State(state): State<AppState>,
    Query(params): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    if params.address.as_str().is_empty() {
        return Err(ApiError::bad_request("address must not be empty"));
    }
    let (_, message) = state.challenges.issue(&params.address);
    Ok(Json(ChallengeResponse {
        address: params.address,
        message,
        expires_in_secs: state.config.challenge_ttl.as_secs(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-in",
    request_body = SignInRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SignInResponse),
        (status = 401, description = "Signature verification failed")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let resolver = IdentityResolver::new(&state.db, &state.config, &state.challenges);
    let user = resolver.resolve(&request.address, &request.message, &request.signature)?;

    let session = state.sessions.create(&user.id, &user.wallet_address);
    state.db.log_audit(
        AuditEvent::new(AuditEventType::SignIn)
            .with_actor(&user.id)
            .with_resource("user", &user.id),
    );
    tracing::info!(user_id = %user.id, address = %user.wallet_address, "Signed in");

    Ok(Json(SignInResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-out",
    tag = "Auth",
    responses((status = 204, description = "Session revoked"))
)]
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.sessions.revoke(token);
    }
    // Revoking an unknown or absent token is not an error
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    fn signed(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", alloy::hex::encode(signature.as_bytes()))
    }

    #[tokio::test]
    async fn challenge_then_sign_in_issues_session() {
        let state = AppState::for_tests();
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let Json(challenge) = challenge(
            State(state.clone()),
            Query(ChallengeQuery {
                address: address.clone(),
            }),
        )
        .await
        .unwrap();
        assert!(challenge.message.contains(address.as_str()));

        let Json(response) = sign_in(
            State(state.clone()),
            Json(SignInRequest {
                address: address.clone(),
                message: challenge.message.clone(),
                signature: signed(&signer, &challenge.message),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.user.wallet_address, address);
        assert!(state.sessions.authenticate(&response.token).is_some());
    }

    #[tokio::test]
    async fn sign_in_with_wrong_signer_is_unauthorized() {
        let state = AppState::for_tests();
        let signer = PrivateKeySigner::random();
        let imposter = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (_, message) = state.challenges.issue(&address);
        let err = sign_in(
            State(state),
            Json(SignInRequest {
                address,
                message: message.clone(),
                signature: signed(&imposter, &message),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_out_revokes_the_session() {
        let state = AppState::for_tests();
        let session = state.sessions.create("user-1", &"0xabc".into());

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", session.token).parse().unwrap(),
        );
        let status = sign_out(State(state.clone()), headers).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.authenticate(&session.token).is_none());
    }
}
