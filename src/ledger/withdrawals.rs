// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Withdrawal lifecycle: request, two-phase settlement, rejection, and the
//! recovery sweep over interrupted settlements.

use serde_json::json;

use crate::error::CoreError;
use crate::models::{User, WithdrawalRequest, WithdrawalStatus};
use crate::storage::{AuditEvent, AuditEventType, LedgerDb};

use super::with_retries;

/// Drives withdrawal requests through their lifecycle.
pub struct WithdrawalManager<'a> {
    db: &'a LedgerDb,
}

impl<'a> WithdrawalManager<'a> {
    pub fn new(db: &'a LedgerDb) -> Self {
        Self { db }
    }

    /// Open a withdrawal request against the user's available balance.
    ///
    /// The balance check and the insert share one write transaction, so
    /// concurrent requests against the same balance serialize and only one
    /// can win the remaining funds.
    pub fn request(
        &self,
        user_id: &str,
        amount: f64,
        notes: Option<String>,
    ) -> Result<WithdrawalRequest, CoreError> {
        if !amount.is_finite() {
            return Err(CoreError::Validation(format!(
                "withdrawal amount must be a number, got {amount}"
            )));
        }
        let request = with_retries(|| self.db.create_withdrawal(user_id, amount, notes.clone()))?;
        tracing::info!(
            request_id = %request.id,
            user_id,
            amount,
            "Withdrawal requested"
        );
        self.db.log_audit(
            AuditEvent::new(AuditEventType::WithdrawalRequested)
                .with_actor(user_id)
                .with_resource("withdrawal", &request.id)
                .with_details(json!({ "amount": amount })),
        );
        Ok(request)
    }

    /// Withdrawal history for a user, newest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>, CoreError> {
        Ok(with_retries(|| self.db.withdrawals_for_user(user_id))?)
    }

    /// All pending requests, newest first.
    pub fn pending(&self) -> Result<Vec<WithdrawalRequest>, CoreError> {
        Ok(with_retries(|| {
            self.db.withdrawals_in_state(WithdrawalStatus::Pending)
        })?)
    }

    /// Settle a pending request in two transactions.
    ///
    /// Phase one moves the request `pending -> processing` and stamps the
    /// acting admin; that transition is the double-settlement guard. Phase
    /// two applies the balance mutation and marks the request `completed`.
    /// A failure between the phases leaves the request in `processing`,
    /// which the reconciliation sweep later finishes.
    pub fn settle(
        &self,
        request_id: &str,
        admin_id: &str,
    ) -> Result<(WithdrawalRequest, User), CoreError> {
        let claimed = with_retries(|| self.db.begin_settlement(request_id, admin_id))?;
        self.db.log_audit(
            AuditEvent::new(AuditEventType::SettlementStarted)
                .with_actor(admin_id)
                .with_resource("withdrawal", request_id)
                .with_details(json!({ "amount": claimed.amount, "user_id": claimed.user_id })),
        );

        let prior = with_retries(|| self.db.get_user(&claimed.user_id))?;
        match with_retries(|| self.db.complete_settlement(request_id)) {
            Ok((request, user)) => {
                tracing::info!(
                    request_id,
                    admin_id,
                    user_id = %user.id,
                    amount = request.amount,
                    "Settlement completed"
                );
                self.db.log_audit(
                    AuditEvent::new(AuditEventType::SettlementCompleted)
                        .with_actor(admin_id)
                        .with_resource("withdrawal", request_id)
                        .with_details(json!({
                            "amount": request.amount,
                            "prior_total_earned": prior.as_ref().map(|u| u.total_earned),
                            "prior_total_withdrawn": prior.as_ref().map(|u| u.total_withdrawn),
                            "total_earned": user.total_earned,
                            "total_withdrawn": user.total_withdrawn,
                        })),
                );
                Ok((request, user))
            }
            Err(e) => {
                tracing::error!(
                    request_id,
                    error = %e,
                    "Settlement interrupted after claim; left for reconciliation"
                );
                Err(CoreError::IncompleteSettlement {
                    request_id: request_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Reject a pending request. The user's balances are untouched and the
    /// funds stay available for a future request.
    pub fn reject(&self, request_id: &str, admin_id: &str) -> Result<WithdrawalRequest, CoreError> {
        let request = with_retries(|| self.db.reject_withdrawal(request_id, admin_id))?;
        tracing::info!(request_id, admin_id, "Withdrawal rejected");
        self.db.log_audit(
            AuditEvent::new(AuditEventType::SettlementRejected)
                .with_actor(admin_id)
                .with_resource("withdrawal", request_id)
                .with_details(json!({ "amount": request.amount, "user_id": request.user_id })),
        );
        Ok(request)
    }

    /// Finish any settlement stuck in `processing`.
    ///
    /// Completion assigns rather than increments balances, so re-running it
    /// on a claimed request converges on the same state. Returns the number
    /// of requests recovered.
    pub fn reconcile(&self) -> Result<usize, CoreError> {
        let stuck = with_retries(|| {
            self.db.withdrawals_in_state(WithdrawalStatus::Processing)
        })?;
        let mut recovered = 0;
        for request in stuck {
            match with_retries(|| self.db.complete_settlement(&request.id)) {
                Ok((request, _)) => {
                    tracing::warn!(
                        request_id = %request.id,
                        user_id = %request.user_id,
                        "Recovered interrupted settlement"
                    );
                    self.db.log_audit(
                        AuditEvent::new(AuditEventType::SettlementCompleted)
                            .with_resource("withdrawal", &request.id)
                            .with_details(json!({ "recovered": true, "amount": request.amount })),
                    );
                    recovered += 1;
                }
                // Raced the settling admin to the finish; nothing to recover.
                Err(CoreError::Conflict(_)) => {}
                Err(e) => {
                    tracing::error!(request_id = %request.id, error = %e, "Recovery failed");
                }
            }
        }
        Ok(recovered)
    }
}
