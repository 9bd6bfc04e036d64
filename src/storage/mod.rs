// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # Embedded Storage Module
//!
//! Persistent storage for users, earning events, withdrawal requests, and the
//! audit log, backed by redb. All multi-step mutations are single write
//! transactions; see [`db::LedgerDb`] for the concurrency model.

pub mod audit;
pub mod db;

pub use audit::{AuditEvent, AuditEventType};
pub use db::{LedgerDb, LedgerDbError, LedgerDbResult};
