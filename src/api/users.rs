// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::Auth, error::ApiError, models::WalletAddress, state::AppState};

/// The signed-in user's profile, with the available balance computed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub wallet_address: WalletAddress,
    /// Referral code to share; uses are counted in `code_uses`.
    pub earning_code: String,
    pub is_admin: bool,
    pub total_earned: f64,
    pub total_withdrawn: f64,
    /// `total_earned - total_withdrawn`, the amount withdrawable right now.
    pub available_balance: f64,
    pub code_uses: u64,
    pub created_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = ProfileResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .db
        .get_user(&caller.user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("user {}", caller.user_id)))?;

    Ok(Json(ProfileResponse {
        available_balance: user.available_balance(),
        id: user.id,
        wallet_address: user.wallet_address,
        earning_code: user.earning_code,
        is_admin: user.is_admin,
        total_earned: user.total_earned,
        total_withdrawn: user.total_withdrawn,
        code_uses: user.code_uses,
        created_at: user.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::models::User;
    use uuid::Uuid;

    #[tokio::test]
    async fn me_returns_profile_with_available_balance() {
        let state = AppState::for_tests();
        let user = User {
            id: Uuid::new_v4().to_string(),
            wallet_address: "0xabc".into(),
            earning_code: "CODE0001".into(),
            is_admin: false,
            total_earned: 0.0,
            total_withdrawn: 0.0,
            code_uses: 0,
            created_at: Utc::now(),
        };
        state.db.create_user(&user).unwrap();
        state.db.record_earning(&user.id, "Ethereum", 1.5).unwrap();

        let Json(profile) = me(
            State(state),
            Auth(AuthenticatedUser {
                user_id: user.id.clone(),
                wallet_address: user.wallet_address.clone(),
                is_admin: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(profile.id, user.id);
        assert_eq!(profile.earning_code, "CODE0001");
        assert!((profile.available_balance - 1.5).abs() < 1e-12);
        assert_eq!(profile.code_uses, 1);
    }
}
