// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Admin-only endpoints: settlement queue, earning credits, user
//! management, system stats, and audit queries.
//!
//! Every handler takes the `AdminOnly` extractor; callers without the admin
//! flag get a 403 before the handler body runs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    ledger::{EarningsLedger, WithdrawalManager},
    models::{DeleteUserRequest, EarningEvent, RecordEarningRequest, User, WithdrawalRequest},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Result of a completed settlement.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    /// The settled request, now `completed`.
    pub request: WithdrawalRequest,
    /// The owner's record after the balance mutation.
    pub user: User,
}

/// Result of crediting an earning.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecordEarningResponse {
    /// The appended event.
    pub event: EarningEvent,
    /// The beneficiary after the credit.
    pub user: User,
}

/// System statistics for the admin dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatsResponse {
    /// Total number of users.
    pub total_users: usize,
    /// Withdrawal requests awaiting review.
    pub pending_withdrawals: usize,
    /// Sum of unsettled earnings across all users.
    pub total_earned: f64,
    /// Sum of settled amounts across all users.
    pub total_withdrawn: f64,
    /// Server uptime in seconds.
    pub uptime_seconds: u64,
    /// Current timestamp.
    pub timestamp: String,
}

/// Query parameters for the user list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct UserSearchParams {
    /// Substring filter on wallet address or earning code.
    pub search: Option<String>,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Maximum number of results (default 100).
    pub limit: Option<usize>,
}

// ============================================================================
// Settlement queue
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/withdrawals/pending",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [WithdrawalRequest]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn pending_withdrawals(
    State(state): State<AppState>,
    _admin: AdminOnly,
) -> Result<Json<Vec<WithdrawalRequest>>, ApiError> {
    let manager = WithdrawalManager::new(&state.db);
    Ok(Json(manager.pending()?))
}

#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{request_id}/settle",
    params(("request_id" = String, Path, description = "Withdrawal request to settle")),
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, body = SettlementResponse),
        (status = 409, description = "Request is not pending")
    )
)]
pub async fn settle_withdrawal(
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
) -> Result<Json<SettlementResponse>, ApiError> {
    let manager = WithdrawalManager::new(&state.db);
    let (request, user) = manager.settle(&request_id, &admin.user_id)?;
    Ok(Json(SettlementResponse { request, user }))
}

#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{request_id}/reject",
    params(("request_id" = String, Path, description = "Withdrawal request to reject")),
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, body = WithdrawalRequest),
        (status = 409, description = "Request is not pending")
    )
)]
pub async fn reject_withdrawal(
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let manager = WithdrawalManager::new(&state.db);
    Ok(Json(manager.reject(&request_id, &admin.user_id)?))
}

// ============================================================================
// Earnings attribution
// ============================================================================

#[utoipa::path(
    post,
    path = "/v1/admin/earnings",
    request_body = RecordEarningRequest,
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 201, body = RecordEarningResponse),
        (status = 404, description = "Unknown earning code")
    )
)]
pub async fn record_earning(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(request): Json<RecordEarningRequest>,
) -> Result<(StatusCode, Json<RecordEarningResponse>), ApiError> {
    let ledger = EarningsLedger::new(&state.db, &state.config);
    let (event, user) =
        ledger.record_by_code(&request.earning_code, &request.network, request.amount)?;
    state.db.log_audit(
        AuditEvent::new(AuditEventType::EarningRecorded)
            .with_actor(&admin.user_id)
            .with_resource("earning_event", &event.id)
            .with_details(json!({
                "user_id": user.id,
                "network": event.network,
                "amount": event.amount,
            })),
    );
    Ok((StatusCode::CREATED, Json(RecordEarningResponse { event, user })))
}

// ============================================================================
// User management
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    params(UserSearchParams),
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [User]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Query(params): Query<UserSearchParams>,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut users = state
        .db
        .list_users()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    if let Some(needle) = params.search.as_deref().map(str::to_lowercase) {
        if !needle.is_empty() {
            users.retain(|u| {
                u.wallet_address.as_str().contains(&needle)
                    || u.earning_code.to_lowercase().contains(&needle)
            });
        }
    }

    state.db.log_audit(
        AuditEvent::new(AuditEventType::AdminAccess)
            .with_actor(&admin.user_id)
            .with_resource("users", "list")
            .with_details(json!({ "search": params.search, "results": users.len() })),
    );
    Ok(Json(users))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{user_id}",
    params(("user_id" = String, Path, description = "User to delete")),
    request_body = DeleteUserRequest,
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "User and their records deleted"),
        (status = 400, description = "Confirmation address does not match")
    )
)]
pub async fn delete_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(request): Json<DeleteUserRequest>,
) -> Result<StatusCode, ApiError> {
    let user = state
        .db
        .get_user(&user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id}")))?;

    if request.confirm != user.wallet_address {
        return Err(ApiError::bad_request(
            "confirmation address does not match the user's wallet address",
        ));
    }

    let deleted = state
        .db
        .delete_user(&user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    tracing::warn!(user_id, admin_id = %admin.user_id, "User deleted");
    state.db.log_audit(
        AuditEvent::new(AuditEventType::UserDeleted)
            .with_actor(&admin.user_id)
            .with_resource("user", &user_id)
            .with_details(json!({
                "wallet_address": deleted.wallet_address,
                "total_earned": deleted.total_earned,
                "total_withdrawn": deleted.total_withdrawn,
            })),
    );
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Stats and audit
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = SystemStatsResponse))
)]
pub async fn system_stats(
    State(state): State<AppState>,
    _admin: AdminOnly,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let users = state
        .db
        .list_users()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let manager = WithdrawalManager::new(&state.db);
    let pending = manager.pending()?;

    Ok(Json(SystemStatsResponse {
        total_users: users.len(),
        pending_withdrawals: pending.len(),
        total_earned: users.iter().map(|u| u.total_earned).sum(),
        total_withdrawn: users.iter().map(|u| u.total_withdrawn).sum(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    params(AuditQueryParams),
    tag = "Admin",
    security(("bearer" = [])),
    responses((status = 200, body = [AuditEvent]))
)]
pub async fn audit_log(
    State(state): State<AppState>,
    _admin: AdminOnly,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let limit = params.limit.unwrap_or(100);
    let events = state
        .db
        .recent_audit(limit)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::models::WithdrawalStatus;
    use uuid::Uuid;

    fn admin_caller() -> AdminOnly {
        AdminOnly(AuthenticatedUser {
            user_id: "admin-1".into(),
            wallet_address: "0xadmin".into(),
            is_admin: true,
        })
    }

    fn seeded_user(state: &AppState, address: &str, code: &str, earned: f64) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            wallet_address: address.into(),
            earning_code: code.into(),
            is_admin: false,
            total_earned: 0.0,
            total_withdrawn: 0.0,
            code_uses: 0,
            created_at: Utc::now(),
        };
        state.db.create_user(&user).unwrap();
        if earned > 0.0 {
            state.db.record_earning(&user.id, "Ethereum", earned).unwrap();
        }
        state.db.get_user(&user.id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn settle_flow_via_handlers() {
        let state = AppState::for_tests();
        let user = seeded_user(&state, "0xaaa", "CODE0001", 1.5);
        let request = state.db.create_withdrawal(&user.id, 1.0, None).unwrap();

        let Json(pending) = pending_withdrawals(State(state.clone()), admin_caller())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let Json(settled) = settle_withdrawal(
            Path(request.id.clone()),
            State(state.clone()),
            admin_caller(),
        )
        .await
        .unwrap();
        assert_eq!(settled.request.status, WithdrawalStatus::Completed);
        assert_eq!(settled.user.total_withdrawn, 1.0);
        assert_eq!(settled.user.total_earned, 0.0);

        // Second settle is a conflict
        let err = settle_withdrawal(Path(request.id), State(state), admin_caller())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn record_earning_credits_by_code() {
        let state = AppState::for_tests();
        let user = seeded_user(&state, "0xaaa", "CODE0001", 0.0);

        let (status, Json(response)) = record_earning(
            State(state.clone()),
            admin_caller(),
            Json(RecordEarningRequest {
                earning_code: "CODE0001".into(),
                network: "Base".into(),
                amount: 0.5,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.user.id, user.id);
        assert!((response.user.total_earned - 0.5).abs() < 1e-12);

        let err = record_earning(
            State(state),
            admin_caller(),
            Json(RecordEarningRequest {
                earning_code: "UNKNOWN".into(),
                network: "Base".into(),
                amount: 0.5,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_filters_on_address_and_code() {
        let state = AppState::for_tests();
        seeded_user(&state, "0xaaa111", "ALPHA123", 0.0);
        seeded_user(&state, "0xbbb222", "BRAVO456", 0.0);

        let Json(by_address) = list_users(
            State(state.clone()),
            admin_caller(),
            Query(UserSearchParams {
                search: Some("bbb".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].wallet_address.as_str(), "0xbbb222");

        let Json(by_code) = list_users(
            State(state.clone()),
            admin_caller(),
            Query(UserSearchParams {
                search: Some("alpha".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_code.len(), 1);

        let Json(all) = list_users(
            State(state),
            admin_caller(),
            Query(UserSearchParams { search: None }),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_requires_matching_confirmation() {
        let state = AppState::for_tests();
        let user = seeded_user(&state, "0xaaa", "CODE0001", 0.0);

        let err = delete_user(
            Path(user.id.clone()),
            State(state.clone()),
            admin_caller(),
            Json(DeleteUserRequest {
                confirm: "0xwrong".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(state.db.get_user(&user.id).unwrap().is_some());

        let status = delete_user(
            Path(user.id.clone()),
            State(state.clone()),
            admin_caller(),
            Json(DeleteUserRequest {
                confirm: user.wallet_address.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.db.get_user(&user.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_count_users_and_pending() {
        let state = AppState::for_tests();
        let user = seeded_user(&state, "0xaaa", "CODE0001", 2.0);
        state.db.create_withdrawal(&user.id, 1.0, None).unwrap();

        let Json(stats) = system_stats(State(state), admin_caller()).await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.pending_withdrawals, 1);
        assert!((stats.total_earned - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn audit_log_returns_recent_events() {
        let state = AppState::for_tests();
        state.db.log_audit(AuditEvent::new(AuditEventType::SignIn).with_actor("u1"));
        // Separate the timestamps so the ordering assertion is deterministic
        std::thread::sleep(std::time::Duration::from_millis(2));
        state.db.log_audit(AuditEvent::new(AuditEventType::AdminAccess).with_actor("a1"));

        let Json(events) = audit_log(
            State(state),
            admin_caller(),
            Query(AuditQueryParams { limit: Some(10) }),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0].event_type, AuditEventType::AdminAccess);
    }
}
