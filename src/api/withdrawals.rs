// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::Auth,
    error::ApiError,
    ledger::WithdrawalManager,
    models::{CreateWithdrawalRequest, WithdrawalRequest},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/withdrawals",
    request_body = CreateWithdrawalRequest,
    tag = "Withdrawals",
    security(("bearer" = [])),
    responses(
        (status = 201, body = WithdrawalRequest),
        (status = 422, description = "Amount exceeds available balance")
    )
)]
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), ApiError> {
    let manager = WithdrawalManager::new(&state.db);
    let created = manager.request(&caller.user_id, request.amount, request.notes)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/withdrawals",
    tag = "Withdrawals",
    security(("bearer" = [])),
    responses((status = 200, body = [WithdrawalRequest]))
)]
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<Vec<WithdrawalRequest>>, ApiError> {
    let manager = WithdrawalManager::new(&state.db);
    Ok(Json(manager.history(&caller.user_id)?))
}
