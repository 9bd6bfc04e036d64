// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # Authentication Module
//!
//! Wallet-signature authentication for the affiliate ledger API.
//!
//! ## Auth Flow
//!
//! 1. Client requests a challenge for its wallet address
//!    (`GET /v1/auth/challenge`)
//! 2. The wallet signs the challenge as an EIP-191 personal message
//! 3. Client submits address + message + signature
//!    (`POST /v1/auth/sign-in`)
//! 4. Server:
//!    - checks the challenge was issued, is fresh, and was never used before
//!    - recovers the signer address and compares it to the claimed address
//!    - resolves (or creates) the user record
//!    - issues an opaque session token with a configurable TTL
//!
//! ## Security
//!
//! - Challenges are single-use and expire after `CHALLENGE_TTL_SECS`
//! - Sessions expire server-side after `SESSION_TTL_SECS`
//! - The admin flag is re-read from storage on every request

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod session;

pub use challenge::ChallengeStore;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, AuthenticatedUser};
pub use session::{Session, SessionManager};
