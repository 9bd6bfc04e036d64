// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Earnings ledger: append-only credit events and per-network aggregates.

use crate::config::{Config, SUPPORTED_NETWORKS};
use crate::error::CoreError;
use crate::models::{EarningEvent, EarningsBreakdown, NetworkEarning, User};
use crate::storage::LedgerDb;

use super::with_retries;

/// Records and aggregates referral earnings.
pub struct EarningsLedger<'a> {
    db: &'a LedgerDb,
    config: &'a Config,
}

impl<'a> EarningsLedger<'a> {
    pub fn new(db: &'a LedgerDb, config: &'a Config) -> Self {
        Self { db, config }
    }

    /// Append an earning event for a user.
    ///
    /// The cached `total_earned` and `code_uses` on the user move in the
    /// same transaction as the event append, so the totals always reconcile
    /// with the event sum.
    pub fn record_earning(
        &self,
        user_id: &str,
        network: &str,
        amount: f64,
    ) -> Result<(EarningEvent, User), CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::Validation(format!(
                "earning amount must be positive, got {amount}"
            )));
        }
        let canonical = self.config.canonical_network(network).ok_or_else(|| {
            CoreError::Validation(format!("unsupported network: {network}"))
        })?;

        let (event, user) = with_retries(|| self.db.record_earning(user_id, canonical, amount))?;
        tracing::info!(
            user_id,
            network = canonical,
            amount,
            total_earned = user.total_earned,
            "Recorded earning"
        );
        Ok((event, user))
    }

    /// Append an earning event for the owner of an earning code.
    pub fn record_by_code(
        &self,
        earning_code: &str,
        network: &str,
        amount: f64,
    ) -> Result<(EarningEvent, User), CoreError> {
        let user = with_retries(|| self.db.get_user_by_code(earning_code))?
            .ok_or_else(|| CoreError::NotFound(format!("earning code {earning_code}")))?;
        self.record_earning(&user.id, network, amount)
    }

    /// Per-network earnings breakdown for a user.
    ///
    /// Every supported network appears in the result, zero-filled; the total
    /// equals the sum over all networks (and the user's cached
    /// `total_earned`).
    pub fn aggregate_by_network(&self, user_id: &str) -> Result<EarningsBreakdown, CoreError> {
        with_retries(|| self.db.get_user(user_id))?
            .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?;
        let events = with_retries(|| self.db.earning_events(user_id))?;

        let networks: Vec<NetworkEarning> = SUPPORTED_NETWORKS
            .iter()
            .map(|(name, symbol)| NetworkEarning {
                network: (*name).to_string(),
                symbol: (*symbol).to_string(),
                amount: events
                    .iter()
                    .filter(|e| e.network == *name)
                    .map(|e| e.amount)
                    .sum(),
            })
            .collect();
        let total_earned = networks.iter().map(|n| n.amount).sum();

        Ok(EarningsBreakdown {
            networks,
            total_earned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn setup() -> (LedgerDb, Config, User) {
        let db = LedgerDb::open_in_memory();
        let user = User {
            id: Uuid::new_v4().to_string(),
            wallet_address: "0xaaa".into(),
            earning_code: "CODE0001".into(),
            is_admin: false,
            total_earned: 0.0,
            total_withdrawn: 0.0,
            code_uses: 0,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        (db, Config::default(), user)
    }

    #[test]
    fn rejects_non_positive_amounts_and_unknown_networks() {
        let (db, config, user) = setup();
        let ledger = EarningsLedger::new(&db, &config);

        assert!(matches!(
            ledger.record_earning(&user.id, "Ethereum", 0.0).unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            ledger.record_earning(&user.id, "Ethereum", -1.0).unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            ledger.record_earning(&user.id, "Dogechain", 1.0).unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[test]
    fn aggregate_reports_all_networks_zero_filled() {
        let (db, config, user) = setup();
        let ledger = EarningsLedger::new(&db, &config);

        ledger.record_earning(&user.id, "Ethereum", 0.1).unwrap();
        ledger.record_earning(&user.id, "ethereum", 0.2).unwrap();

        let breakdown = ledger.aggregate_by_network(&user.id).unwrap();
        assert_eq!(breakdown.networks.len(), SUPPORTED_NETWORKS.len());

        let eth = breakdown
            .networks
            .iter()
            .find(|n| n.network == "Ethereum")
            .unwrap();
        assert!((eth.amount - 0.3).abs() < 1e-12);
        assert_eq!(eth.symbol, "ETH");

        for entry in breakdown.networks.iter().filter(|n| n.network != "Ethereum") {
            assert_eq!(entry.amount, 0.0);
        }
        assert!((breakdown.total_earned - 0.3).abs() < 1e-12);
    }

    #[test]
    fn breakdown_total_reconciles_with_cached_total() {
        let (db, config, user) = setup();
        let ledger = EarningsLedger::new(&db, &config);

        let amounts = [
            ("Ethereum", 0.1),
            ("Polygon", 0.25),
            ("Avalanche", 0.05),
            ("Ethereum", 0.4),
        ];
        for (network, amount) in amounts {
            ledger.record_earning(&user.id, network, amount).unwrap();

            // Invariant: breakdown total equals the cached total after
            // every single mutation
            let cached = db.get_user(&user.id).unwrap().unwrap().total_earned;
            let breakdown = ledger.aggregate_by_network(&user.id).unwrap();
            assert!((breakdown.total_earned - cached).abs() < 1e-9);
        }

        let user = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(user.code_uses, 4);
    }

    #[test]
    fn record_by_code_resolves_the_owner() {
        let (db, config, user) = setup();
        let ledger = EarningsLedger::new(&db, &config);

        let (_, updated) = ledger.record_by_code("CODE0001", "Base", 1.0).unwrap();
        assert_eq!(updated.id, user.id);
        assert!((updated.total_earned - 1.0).abs() < 1e-12);

        assert!(matches!(
            ledger.record_by_code("NOPE", "Base", 1.0).unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn aggregate_for_missing_user_is_not_found() {
        let (db, config, _) = setup();
        let ledger = EarningsLedger::new(&db, &config);
        assert!(matches!(
            ledger.aggregate_by_network("ghost").unwrap_err(),
            CoreError::NotFound(_)
        ));
    }
}
