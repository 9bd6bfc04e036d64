// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateWithdrawalRequest, DeleteUserRequest, EarningEvent, EarningsBreakdown,
        NetworkEarning, RecordEarningRequest, User, WalletAddress, WithdrawalRequest,
        WithdrawalStatus,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub mod admin;
pub mod auth;
pub mod earnings;
pub mod health;
pub mod users;
pub mod withdrawals;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/challenge", get(auth::challenge))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/users/me", get(users::me))
        .route("/earnings/networks", get(earnings::networks))
        .route(
            "/withdrawals",
            get(withdrawals::list_withdrawals).post(withdrawals::create_withdrawal),
        )
        .route(
            "/admin/withdrawals/pending",
            get(admin::pending_withdrawals),
        )
        .route(
            "/admin/withdrawals/{request_id}/settle",
            post(admin::settle_withdrawal),
        )
        .route(
            "/admin/withdrawals/{request_id}/reject",
            post(admin::reject_withdrawal),
        )
        .route("/admin/earnings", post(admin::record_earning))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", delete(admin::delete_user))
        .route("/admin/stats", get(admin::system_stats))
        .route("/admin/audit", get(admin::audit_log))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::challenge,
        auth::sign_in,
        auth::sign_out,
        users::me,
        earnings::networks,
        withdrawals::create_withdrawal,
        withdrawals::list_withdrawals,
        admin::pending_withdrawals,
        admin::settle_withdrawal,
        admin::reject_withdrawal,
        admin::record_earning,
        admin::list_users,
        admin::delete_user,
        admin::system_stats,
        admin::audit_log
    ),
    components(
        schemas(
            WalletAddress,
            User,
            EarningEvent,
            WithdrawalStatus,
            WithdrawalRequest,
            CreateWithdrawalRequest,
            RecordEarningRequest,
            DeleteUserRequest,
            NetworkEarning,
            EarningsBreakdown,
            AuditEvent,
            AuditEventType,
            auth::ChallengeResponse,
            auth::SignInRequest,
            auth::SignInResponse,
            users::ProfileResponse,
            admin::SettlementResponse,
            admin::RecordEarningResponse,
            admin::SystemStatsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Service health probes"),
        (name = "Auth", description = "Wallet-signature sign-in"),
        (name = "Users", description = "Signed-in user profile"),
        (name = "Earnings", description = "Earnings breakdowns"),
        (name = "Withdrawals", description = "Withdrawal requests"),
        (name = "Admin", description = "Settlement and user management")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Request, StatusCode},
    };
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn session_for(state: &AppState, is_admin: bool) -> String {
        let user = crate::models::User {
            id: Uuid::new_v4().to_string(),
            wallet_address: format!("0x{}", Uuid::new_v4().simple()).into(),
            earning_code: Uuid::new_v4().simple().to_string()[..8].to_uppercase(),
            is_admin,
            total_earned: 0.0,
            total_withdrawn: 0.0,
            code_uses: 0,
            created_at: Utc::now(),
        };
        state.db.create_user(&user).unwrap();
        state.sessions.create(&user.id, &user.wallet_address).token
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::for_tests());
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn health_is_reachable() {
        let app = router(AppState::for_tests());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_requires_session() {
        let app = router(AppState::for_tests());
        let response = app
            .oneshot(Request::get("/v1/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pending_queue_is_forbidden_for_non_admins() {
        let state = AppState::for_tests();
        let token = session_for(&state, false);
        let app = router(state);

        let response = app
            .oneshot(
                Request::get("/v1/admin/withdrawals/pending")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn pending_queue_is_reachable_for_admins() {
        let state = AppState::for_tests();
        let token = session_for(&state, true);
        let app = router(state);

        let response = app
            .oneshot(
                Request::get("/v1/admin/withdrawals/pending")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn challenge_endpoint_issues_message() {
        let app = router(AppState::for_tests());
        let response = app
            .oneshot(
                Request::get("/v1/auth/challenge?address=0xAbC123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
