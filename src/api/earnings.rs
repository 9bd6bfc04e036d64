// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

use axum::{extract::State, Json};

use crate::{
    auth::Auth, error::ApiError, ledger::EarningsLedger, models::EarningsBreakdown,
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/earnings/networks",
    tag = "Earnings",
    security(("bearer" = [])),
    responses(
        (status = 200, body = EarningsBreakdown),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn networks(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<EarningsBreakdown>, ApiError> {
    let ledger = EarningsLedger::new(&state.db, &state.config);
    Ok(Json(ledger.aggregate_by_network(&caller.user_id)?))
}
