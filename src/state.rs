// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{ChallengeStore, SessionManager};
use crate::config::Config;
use crate::storage::LedgerDb;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDb>,
    pub sessions: Arc<SessionManager>,
    pub challenges: Arc<ChallengeStore>,
    pub config: Arc<Config>,
    /// Server start time, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: LedgerDb, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            sessions: Arc::new(SessionManager::new(config.session_ttl)),
            challenges: Arc::new(ChallengeStore::new(config.challenge_ttl)),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// State over a throwaway in-memory database.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::new(LedgerDb::open_in_memory(), Config::default())
    }
}
