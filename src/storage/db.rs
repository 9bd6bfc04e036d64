// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized User
//! - `users_by_address`: lowercase wallet address → user_id
//! - `users_by_code`: earning code → user_id
//! - `earning_events`: composite key (user_id|!timestamp|event_id) → serialized EarningEvent
//! - `withdrawals`: withdrawal_id → serialized WithdrawalRequest
//! - `withdrawal_index`: composite key (user_id|!timestamp|withdrawal_id) → withdrawal_id
//! - `audit_log`: composite key (!timestamp|event_id) → serialized AuditEvent
//!
//! ## Concurrency
//!
//! redb serializes write transactions, so every operation below that checks
//! and then mutates (balance-checked withdrawal insert, the settlement state
//! transitions, insert-if-absent user creation) is atomic and linearizable.
//! This is the single serialization point for all balance mutations.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{EarningEvent, User, WalletAddress, WithdrawalRequest, WithdrawalStatus};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized User (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Uniqueness index: lowercase wallet address → user_id.
const USERS_BY_ADDRESS: TableDefinition<&str, &str> = TableDefinition::new("users_by_address");

/// Uniqueness index: earning code → user_id.
const USERS_BY_CODE: TableDefinition<&str, &str> = TableDefinition::new("users_by_code");

/// Append-only earning events, keyed `user_id|!timestamp_be|event_id` so a
/// forward range scan yields newest-first per user.
const EARNING_EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("earning_events");

/// Primary table: withdrawal_id → serialized WithdrawalRequest (JSON bytes).
const WITHDRAWALS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");

/// Index: `user_id|!timestamp_be|withdrawal_id` → withdrawal_id.
const WITHDRAWAL_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("withdrawal_index");

/// Audit log, keyed `!timestamp_be|event_id` for newest-first scans.
pub(crate) const AUDIT_LOG: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit_log");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: f64, available: f64 },
}

pub type LedgerDbResult<T> = Result<T, LedgerDbError>;

impl From<LedgerDbError> for CoreError {
    fn from(err: LedgerDbError) -> Self {
        match err {
            LedgerDbError::NotFound(what) => CoreError::NotFound(what),
            LedgerDbError::Conflict(what) => CoreError::Conflict(what),
            LedgerDbError::InsufficientBalance {
                requested,
                available,
            } => CoreError::InsufficientBalance {
                requested,
                available,
            },
            other => CoreError::Transient(other.to_string()),
        }
    }
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key scoped to an owner.
///
/// Format: `owner_id | inverted_timestamp_be_bytes | entry_id`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_scoped_key(owner_id: &str, timestamp: i64, entry_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner_id.len() + 1 + 8 + 1 + entry_id.len());
    key.extend_from_slice(owner_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(entry_id.as_bytes());
    key
}

/// Build a prefix for range scanning all entries of an owner.
fn make_prefix(owner_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner_id.len() + 1);
    prefix.extend_from_slice(owner_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a prefix range scan.
fn make_prefix_end(owner_id: &str) -> Vec<u8> {
    let mut end = make_prefix(owner_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// LedgerDb
// =============================================================================

/// Embedded ACID ledger database.
pub struct LedgerDb {
    pub(crate) db: Database,
}

impl LedgerDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> LedgerDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_ADDRESS)?;
            let _ = write_txn.open_table(USERS_BY_CODE)?;
            let _ = write_txn.open_table(EARNING_EVENTS)?;
            let _ = write_txn.open_table(WITHDRAWALS)?;
            let _ = write_txn.open_table(WITHDRAWAL_INDEX)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Open a throwaway in-memory database for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .expect("in-memory database");
        let ledger = Self { db };
        let write_txn = ledger.db.begin_write().expect("begin write");
        {
            let _ = write_txn.open_table(USERS).unwrap();
            let _ = write_txn.open_table(USERS_BY_ADDRESS).unwrap();
            let _ = write_txn.open_table(USERS_BY_CODE).unwrap();
            let _ = write_txn.open_table(EARNING_EVENTS).unwrap();
            let _ = write_txn.open_table(WITHDRAWALS).unwrap();
            let _ = write_txn.open_table(WITHDRAWAL_INDEX).unwrap();
            let _ = write_txn.open_table(AUDIT_LOG).unwrap();
        }
        write_txn.commit().expect("commit");
        ledger
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user, enforcing address and earning-code uniqueness.
    ///
    /// Returns `Conflict` if either key is already taken; the caller retries
    /// an address conflict as a lookup.
    pub fn create_user(&self, user: &User) -> LedgerDbResult<()> {
        let json = serde_json::to_vec(user)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut addr_table = write_txn.open_table(USERS_BY_ADDRESS)?;
            if addr_table.get(user.wallet_address.as_str())?.is_some() {
                return Err(LedgerDbError::Conflict(format!(
                    "address {} already registered",
                    user.wallet_address
                )));
            }
            let mut code_table = write_txn.open_table(USERS_BY_CODE)?;
            if code_table.get(user.earning_code.as_str())?.is_some() {
                return Err(LedgerDbError::Conflict(format!(
                    "earning code {} already taken",
                    user.earning_code
                )));
            }

            addr_table.insert(user.wallet_address.as_str(), user.id.as_str())?;
            code_table.insert(user.earning_code.as_str(), user.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a user by ID.
    pub fn get_user(&self, user_id: &str) -> LedgerDbResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by wallet address.
    pub fn get_user_by_address(&self, address: &WalletAddress) -> LedgerDbResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let addr_table = read_txn.open_table(USERS_BY_ADDRESS)?;
        let Some(user_id) = addr_table.get(address.as_str())? else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by earning code.
    pub fn get_user_by_code(&self, earning_code: &str) -> LedgerDbResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let code_table = read_txn.open_table(USERS_BY_CODE)?;
        let Some(user_id) = code_table.get(earning_code)? else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all users, newest first.
    pub fn list_users(&self) -> LedgerDbResult<Vec<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut users = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            users.push(serde_json::from_slice::<User>(value.value())?);
        }
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    /// Hard-delete a user together with their earning events and withdrawal
    /// requests (cascade). Returns the deleted record.
    pub fn delete_user(&self, user_id: &str) -> LedgerDbResult<User> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let user: User = match users.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(LedgerDbError::NotFound(format!("user {user_id}"))),
            };
            users.remove(user_id)?;

            let mut addr_table = write_txn.open_table(USERS_BY_ADDRESS)?;
            addr_table.remove(user.wallet_address.as_str())?;
            let mut code_table = write_txn.open_table(USERS_BY_CODE)?;
            code_table.remove(user.earning_code.as_str())?;

            // Cascade: earning events
            let mut events = write_txn.open_table(EARNING_EVENTS)?;
            let event_keys: Vec<Vec<u8>> = {
                let start = make_prefix(user_id);
                let end = make_prefix_end(user_id);
                let mut keys = Vec::new();
                for item in events.range(start.as_slice()..end.as_slice())? {
                    let (key, _) = item?;
                    keys.push(key.value().to_vec());
                }
                keys
            };
            for key in event_keys {
                events.remove(key.as_slice())?;
            }

            // Cascade: withdrawals via the per-user index
            let mut index = write_txn.open_table(WITHDRAWAL_INDEX)?;
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let (index_keys, withdrawal_ids): (Vec<Vec<u8>>, Vec<String>) = {
                let start = make_prefix(user_id);
                let end = make_prefix_end(user_id);
                let mut keys = Vec::new();
                let mut ids = Vec::new();
                for item in index.range(start.as_slice()..end.as_slice())? {
                    let (key, value) = item?;
                    keys.push(key.value().to_vec());
                    ids.push(value.value().to_string());
                }
                (keys, ids)
            };
            for key in index_keys {
                index.remove(key.as_slice())?;
            }
            for id in withdrawal_ids {
                withdrawals.remove(id.as_str())?;
            }

            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    // =========================================================================
    // Earning Events
    // =========================================================================

    /// Append an earning event and atomically update the cached totals on the
    /// owning user (`total_earned` and `code_uses`).
    pub fn record_earning(
        &self,
        user_id: &str,
        network: &str,
        amount: f64,
    ) -> LedgerDbResult<(EarningEvent, User)> {
        let event = EarningEvent {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            network: network.to_string(),
            amount,
            created_at: Utc::now(),
        };
        let event_json = serde_json::to_vec(&event)?;

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user: User = match users.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(LedgerDbError::NotFound(format!("user {user_id}"))),
            };

            user.total_earned += amount;
            user.code_uses += 1;
            let user_json = serde_json::to_vec(&user)?;
            users.insert(user_id, user_json.as_slice())?;

            let mut events = write_txn.open_table(EARNING_EVENTS)?;
            let key = make_scoped_key(user_id, event.created_at.timestamp_micros(), &event.id);
            events.insert(key.as_slice(), event_json.as_slice())?;

            user
        };
        write_txn.commit()?;
        Ok((event, updated))
    }

    /// All earning events for a user, newest first.
    pub fn earning_events(&self, user_id: &str) -> LedgerDbResult<Vec<EarningEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EARNING_EVENTS)?;
        let start = make_prefix(user_id);
        let end = make_prefix_end(user_id);
        let mut events = Vec::new();
        for item in table.range(start.as_slice()..end.as_slice())? {
            let (_, value) = item?;
            events.push(serde_json::from_slice::<EarningEvent>(value.value())?);
        }
        Ok(events)
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    /// Insert a withdrawal request in `pending` state.
    ///
    /// The available-balance check happens inside the same write transaction
    /// as the insert, so two concurrent requests cannot both pass it against
    /// a stale read.
    pub fn create_withdrawal(
        &self,
        user_id: &str,
        amount: f64,
        notes: Option<String>,
    ) -> LedgerDbResult<WithdrawalRequest> {
        let request = WithdrawalRequest {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            status: WithdrawalStatus::Pending,
            notes,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
        };
        let json = serde_json::to_vec(&request)?;

        let write_txn = self.db.begin_write()?;
        {
            let users = write_txn.open_table(USERS)?;
            let user: User = match users.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(LedgerDbError::NotFound(format!("user {user_id}"))),
            };
            let available = user.available_balance();
            if amount <= 0.0 || amount > available {
                return Err(LedgerDbError::InsufficientBalance {
                    requested: amount,
                    available,
                });
            }
            drop(users);

            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            withdrawals.insert(request.id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(WITHDRAWAL_INDEX)?;
            let key =
                make_scoped_key(user_id, request.requested_at.timestamp_micros(), &request.id);
            index.insert(key.as_slice(), request.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(request)
    }

    /// Look up a withdrawal request by ID.
    pub fn get_withdrawal(&self, request_id: &str) -> LedgerDbResult<Option<WithdrawalRequest>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS)?;
        match table.get(request_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All withdrawal requests for a user, newest first.
    pub fn withdrawals_for_user(&self, user_id: &str) -> LedgerDbResult<Vec<WithdrawalRequest>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(WITHDRAWAL_INDEX)?;
        let withdrawals = read_txn.open_table(WITHDRAWALS)?;
        let start = make_prefix(user_id);
        let end = make_prefix_end(user_id);
        let mut requests = Vec::new();
        for item in index.range(start.as_slice()..end.as_slice())? {
            let (_, id) = item?;
            if let Some(value) = withdrawals.get(id.value())? {
                requests.push(serde_json::from_slice::<WithdrawalRequest>(value.value())?);
            }
        }
        Ok(requests)
    }

    /// All requests currently in the given state, newest first.
    pub fn withdrawals_in_state(
        &self,
        status: WithdrawalStatus,
    ) -> LedgerDbResult<Vec<WithdrawalRequest>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS)?;
        let mut requests = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let request: WithdrawalRequest = serde_json::from_slice(value.value())?;
            if request.status == status {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    /// Transition a request `pending -> processing` and stamp the acting
    /// admin. Fails with `Conflict` unless the request is `pending`, which
    /// is what makes double settlement impossible.
    pub fn begin_settlement(
        &self,
        request_id: &str,
        admin_id: &str,
    ) -> LedgerDbResult<WithdrawalRequest> {
        let write_txn = self.db.begin_write()?;
        let request = {
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut request: WithdrawalRequest = match withdrawals.get(request_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(LedgerDbError::NotFound(format!("withdrawal {request_id}")))
                }
            };
            if request.status != WithdrawalStatus::Pending {
                return Err(LedgerDbError::Conflict(format!(
                    "withdrawal {request_id} is {}, not pending",
                    request.status
                )));
            }
            request.status = WithdrawalStatus::Processing;
            request.processed_by = Some(admin_id.to_string());
            let json = serde_json::to_vec(&request)?;
            withdrawals.insert(request_id, json.as_slice())?;
            request
        };
        write_txn.commit()?;
        Ok(request)
    }

    /// Finish a settlement: apply the balance mutation and transition the
    /// request `processing -> completed`.
    ///
    /// The balance mutation assigns rather than increments
    /// (`total_withdrawn = amount`, `total_earned = 0`), treating
    /// `total_earned` as the pending pool since the last settlement. Because
    /// it is a pure assignment, re-running this step on a request still in
    /// `processing` is safe, which is what the reconciliation sweep relies on.
    pub fn complete_settlement(
        &self,
        request_id: &str,
    ) -> LedgerDbResult<(WithdrawalRequest, User)> {
        let write_txn = self.db.begin_write()?;
        let (request, user) = {
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut request: WithdrawalRequest = match withdrawals.get(request_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(LedgerDbError::NotFound(format!("withdrawal {request_id}")))
                }
            };
            if request.status != WithdrawalStatus::Processing {
                return Err(LedgerDbError::Conflict(format!(
                    "withdrawal {request_id} is {}, not processing",
                    request.status
                )));
            }

            let mut users = write_txn.open_table(USERS)?;
            let mut user: User = match users.get(request.user_id.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(LedgerDbError::NotFound(format!("user {}", request.user_id)))
                }
            };
            user.total_withdrawn = request.amount;
            user.total_earned = 0.0;
            let user_json = serde_json::to_vec(&user)?;
            users.insert(user.id.as_str(), user_json.as_slice())?;

            request.status = WithdrawalStatus::Completed;
            request.processed_at = Some(Utc::now());
            let json = serde_json::to_vec(&request)?;
            withdrawals.insert(request_id, json.as_slice())?;
            (request, user)
        };
        write_txn.commit()?;
        Ok((request, user))
    }

    /// Transition a request `pending -> rejected`. No balance side effects.
    pub fn reject_withdrawal(
        &self,
        request_id: &str,
        admin_id: &str,
    ) -> LedgerDbResult<WithdrawalRequest> {
        let write_txn = self.db.begin_write()?;
        let request = {
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut request: WithdrawalRequest = match withdrawals.get(request_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(LedgerDbError::NotFound(format!("withdrawal {request_id}")))
                }
            };
            if request.status != WithdrawalStatus::Pending {
                return Err(LedgerDbError::Conflict(format!(
                    "withdrawal {request_id} is {}, not pending",
                    request.status
                )));
            }
            request.status = WithdrawalStatus::Rejected;
            request.processed_by = Some(admin_id.to_string());
            request.processed_at = Some(Utc::now());
            let json = serde_json::to_vec(&request)?;
            withdrawals.insert(request_id, json.as_slice())?;
            request
        };
        write_txn.commit()?;
        Ok(request)
    }
}
