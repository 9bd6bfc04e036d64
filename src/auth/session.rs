// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Server-side sessions.
//!
//! A successful sign-in issues an opaque bearer token bound to the user and
//! wallet address. Sessions expire after a configurable TTL and are held in
//! a bounded LRU cache; expired entries are evicted on access.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use uuid::Uuid;

use crate::models::WalletAddress;

/// Maximum number of live sessions kept in memory.
const SESSION_CACHE_SIZE: usize = 4096;

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// The signed-in user.
    pub user_id: String,
    /// Wallet address the session was established for.
    pub address: WalletAddress,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// In-process session registry.
pub struct SessionManager {
    inner: Mutex<LruCache<String, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(SESSION_CACHE_SIZE).unwrap(),
            )),
            ttl,
        }
    }

    /// Create a session for a signed-in user.
    pub fn create(&self, user_id: &str, address: &WalletAddress) -> Session {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            address: address.clone(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1)),
        };
        self.inner
            .lock()
            .unwrap()
            .put(session.token.clone(), session.clone());
        session
    }

    /// Resolve a bearer token to a live session.
    ///
    /// Expired sessions are removed and reported as absent.
    pub fn authenticate(&self, token: &str) -> Option<Session> {
        let mut cache = self.inner.lock().unwrap();
        match cache.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.clone()),
            Some(_) => {
                cache.pop(token);
                None
            }
            None => None,
        }
    }

    /// Revoke a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.inner.lock().unwrap().pop(token).is_some()
    }
}
