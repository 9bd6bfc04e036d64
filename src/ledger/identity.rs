// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Identity resolution: verified wallet address → user record.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::ChallengeStore;
use crate::config::Config;
use crate::error::CoreError;
use crate::models::{User, WalletAddress};
use crate::storage::{AuditEvent, AuditEventType, LedgerDb};

use super::with_retries;

/// How many earning-code collisions to tolerate before giving up.
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Resolves a signature proof to a user, creating the record on first sight.
pub struct IdentityResolver<'a> {
    db: &'a LedgerDb,
    config: &'a Config,
    challenges: &'a ChallengeStore,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(db: &'a LedgerDb, config: &'a Config, challenges: &'a ChallengeStore) -> Self {
        Self {
            db,
            config,
            challenges,
        }
    }

    /// Resolve a wallet address to its user record, verifying the signature
    /// proof first.
    ///
    /// Idempotent: the same address always maps to the same user. A
    /// uniqueness conflict on a concurrent first sign-in is retried as a
    /// lookup.
    pub fn resolve(
        &self,
        address: &WalletAddress,
        message: &str,
        signature: &str,
    ) -> Result<User, CoreError> {
        self.challenges
            .verify(address, message, signature)
            .map_err(|e| {
                self.db.log_audit(
                    AuditEvent::new(AuditEventType::AuthFailure)
                        .with_resource("address", address.as_str())
                        .failed(e.to_string()),
                );
                CoreError::Authentication(e.to_string())
            })?;

        if let Some(user) = with_retries(|| self.db.get_user_by_address(address))? {
            return Ok(user);
        }
        self.create_user(address)
    }

    fn create_user(&self, address: &WalletAddress) -> Result<User, CoreError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let user = User {
                id: Uuid::new_v4().to_string(),
                wallet_address: address.clone(),
                earning_code: generate_earning_code(),
                is_admin: self.config.is_admin_address(address.as_str()),
                total_earned: 0.0,
                total_withdrawn: 0.0,
                code_uses: 0,
                created_at: Utc::now(),
            };
            match with_retries(|| self.db.create_user(&user)) {
                Ok(()) => {
                    tracing::info!(user_id = %user.id, address = %address, "Created user");
                    self.db.log_audit(
                        AuditEvent::new(AuditEventType::UserCreated)
                            .with_actor(&user.id)
                            .with_resource("user", &user.id),
                    );
                    return Ok(user);
                }
                Err(CoreError::Conflict(_)) => {
                    // Either the address raced another first sign-in or the
                    // generated code collided; a lookup settles which.
                    if let Some(existing) = with_retries(|| self.db.get_user_by_address(address))?
                    {
                        return Ok(existing);
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(CoreError::Conflict(
            "could not allocate a unique earning code".into(),
        ))
    }
}

/// Generate an 8-character uppercase earning code.
fn generate_earning_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
