// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Affiliate Ledger - Referral Earnings and Withdrawal Settlement Service
//!
//! Users authenticate by signing a challenge with their wallet key, track
//! referral earnings per network, and file withdrawal requests; admins credit
//! earnings and settle or reject withdrawals.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Challenge/signature sign-in, sessions, extractors
//! - `ledger` - Identity, earnings, and withdrawal domain services
//! - `storage` - Embedded redb database and audit log
//! - `reconciler` - Background recovery of interrupted settlements

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reconciler;
pub mod state;
pub mod storage;
