// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # Settlement Reconciler
//!
//! Background task that finishes settlements interrupted between their two
//! phases. A crash after a request is claimed (`pending -> processing`) but
//! before the balance mutation commits leaves the request in `processing`;
//! every sweep re-runs the completion step for such requests. Completion
//! assigns rather than increments, so re-running it is safe.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ledger::WithdrawalManager;
use crate::storage::LedgerDb;

/// Background sweep over withdrawals stuck in `processing`.
pub struct SettlementReconciler {
    db: Arc<LedgerDb>,
    sweep_interval: Duration,
}

impl SettlementReconciler {
    pub fn new(db: Arc<LedgerDb>, sweep_interval: Duration) -> Self {
        Self { db, sweep_interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(reconciler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Settlement reconciler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Settlement reconciler shutting down");
                return;
            }

            self.sweep();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Settlement reconciler shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: complete every request found in `processing`.
    fn sweep(&self) {
        let manager = WithdrawalManager::new(&self.db);
        match manager.reconcile() {
            Ok(0) => {}
            Ok(recovered) => {
                info!(recovered, "Reconciler: recovered interrupted settlements");
            }
            Err(e) => {
                warn!(error = %e, "Reconciler: sweep failed");
            }
        }
    }
}
