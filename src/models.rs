// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # API Data Models
//!
//! Entities stored in the ledger database and the request/response types of
//! the REST API. All types derive `Serialize`, `Deserialize`, and `ToSchema`
//! for automatic JSON handling and OpenAPI documentation.
//!
//! ## Wallet Address Type
//!
//! The [`WalletAddress`] newtype wraps wallet addresses and normalizes them
//! to lowercase on construction; address equality throughout the service is
//! case-insensitive by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Wallet address wrapper, normalized to lowercase.
///
/// Users are keyed by their lowercase address; normalizing here keeps every
/// lookup and uniqueness check consistent regardless of how the caller
/// checksums the address.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(value: impl AsRef<str>) -> Self {
        WalletAddress(value.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(WalletAddress::new(raw))
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress::new(value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress::new(value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// User
// =============================================================================

/// A user identified by their wallet address.
///
/// Created on first successful sign-in. `total_earned` is a cached value
/// kept in lockstep with the sum of the user's earning events; settlement
/// resets it to zero and records the settled amount in `total_withdrawn`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct User {
    /// Unique identifier (UUID).
    pub id: String,
    /// Lowercase wallet address (unique).
    pub wallet_address: WalletAddress,
    /// Referral code others use to attribute commissions (unique).
    pub earning_code: String,
    /// Whether this user may use the admin interface.
    pub is_admin: bool,
    /// Earnings accrued since the last settlement.
    pub total_earned: f64,
    /// Amount paid out by the most recent settlement.
    pub total_withdrawn: f64,
    /// How many times the earning code has been used.
    pub code_uses: u64,
    /// When the user record was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Balance currently available for withdrawal.
    pub fn available_balance(&self) -> f64 {
        self.total_earned - self.total_withdrawn
    }
}

// =============================================================================
// Earning Events
// =============================================================================

/// Immutable record of a single referral commission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EarningEvent {
    /// Unique identifier (UUID).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Canonical network name (see `config::SUPPORTED_NETWORKS`).
    pub network: String,
    /// Commission amount, strictly positive.
    pub amount: f64,
    /// When the commission was recorded.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Withdrawal Requests
// =============================================================================

/// Lifecycle state of a withdrawal request.
///
/// Legal transitions: `pending -> processing -> completed` and
/// `pending -> rejected`. `processing` is held only while settlement is in
/// flight; `completed` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// A user's request to withdraw part of their available balance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct WithdrawalRequest {
    /// Unique identifier (UUID).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Requested amount; validated against available balance at creation.
    pub amount: f64,
    /// Current lifecycle state.
    pub status: WithdrawalStatus,
    /// Optional payout instructions supplied by the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the request was filed.
    pub requested_at: DateTime<Utc>,
    /// When the request reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Admin who settled or rejected the request (audit reference).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Request to file a withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateWithdrawalRequest {
    /// Amount to withdraw.
    pub amount: f64,
    /// Optional payout instructions.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request to credit an earning to the owner of an earning code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordEarningRequest {
    /// Earning code identifying the beneficiary.
    pub earning_code: String,
    /// Network the commission was earned on.
    pub network: String,
    /// Commission amount.
    pub amount: f64,
}

/// Confirmation body required to hard-delete a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteUserRequest {
    /// Must echo the victim's wallet address exactly.
    pub confirm: WalletAddress,
}

/// Per-network earnings line in the aggregate breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct NetworkEarning {
    /// Canonical network name.
    pub network: String,
    /// Token symbol shown alongside the amount.
    pub symbol: String,
    /// Total earned on this network.
    pub amount: f64,
}

/// Aggregate earnings breakdown for a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EarningsBreakdown {
    /// One entry per supported network, zero-filled.
    pub networks: Vec<NetworkEarning>,
    /// Sum across all networks; always equals the user's `total_earned`.
    pub total_earned: f64,
}
