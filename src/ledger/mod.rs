// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # Ledger Core
//!
//! The domain services behind the API:
//!
//! - [`identity`] - maps a verified wallet address to a user record
//! - [`earnings`] - append-only earning events and per-network aggregates
//! - [`withdrawals`] - withdrawal request lifecycle and settlement
//!
//! Services borrow the shared [`LedgerDb`](crate::storage::LedgerDb) and are
//! constructed per call; all state lives in storage.

pub mod earnings;
pub mod identity;
pub mod withdrawals;

pub use earnings::EarningsLedger;
pub use identity::IdentityResolver;
pub use withdrawals::WithdrawalManager;

use crate::error::CoreError;
use crate::storage::LedgerDbError;

/// Bounded internal retry for transient storage failures.
///
/// Validation, conflict, and business-rule errors surface immediately;
/// only transient failures are re-attempted.
pub(crate) fn with_retries<T>(
    mut op: impl FnMut() -> Result<T, LedgerDbError>,
) -> Result<T, CoreError> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                let core: CoreError = e.into();
                attempt += 1;
                if core.is_retryable() && attempt < MAX_ATTEMPTS {
                    tracing::warn!(attempt, error = %core, "Retrying transient storage failure");
                    continue;
                }
                return Err(core);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_transient_then_surfaces() {
        let mut calls = 0;
        let result: Result<(), CoreError> = with_retries(|| {
            calls += 1;
            Err(LedgerDbError::Serde(
                serde_json::from_str::<i32>("x").unwrap_err(),
            ))
        });
        assert!(matches!(result, Err(CoreError::Transient(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn conflict_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), CoreError> = with_retries(|| {
            calls += 1;
            Err(LedgerDbError::Conflict("taken".into()))
        });
        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(calls, 1);
    }
}
