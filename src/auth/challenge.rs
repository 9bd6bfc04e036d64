// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Sign-in challenges and wallet signature verification.
//!
//! A challenge is a plain-text message the wallet signs as an EIP-191
//! personal message:
//!
//! ```text
//! Sign this message to verify your wallet address: 0xabc...
//! Nonce: 6d3a...
//! Timestamp: 1767225600000
//! ```
//!
//! Challenges are single-use: the server keeps issued nonces in a bounded
//! cache and consumes them on verification, so a captured proof cannot be
//! replayed even inside the freshness window. The embedded timestamp bounds
//! the window itself.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, Signature};
use chrono::Utc;
use lru::LruCache;
use uuid::Uuid;

use crate::models::WalletAddress;

use super::error::AuthError;

/// Maximum number of outstanding challenges kept in memory.
const CHALLENGE_CACHE_SIZE: usize = 1024;

/// Tolerated clock skew for challenge timestamps (60 seconds).
const CLOCK_SKEW_MS: i64 = 60_000;

/// A challenge issued to a wallet, awaiting signature.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub address: WalletAddress,
    pub nonce: String,
    pub issued_at_ms: i64,
}

/// Fields parsed back out of a submitted challenge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChallenge {
    pub address: WalletAddress,
    pub nonce: String,
    pub timestamp_ms: i64,
}

/// Bounded store of issued, not-yet-consumed challenges.
pub struct ChallengeStore {
    inner: Mutex<LruCache<String, IssuedChallenge>>,
    ttl: Duration,
}

impl ChallengeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(CHALLENGE_CACHE_SIZE).unwrap(),
            )),
            ttl,
        }
    }

    /// Issue a fresh challenge for `address` and return the message to sign.
    pub fn issue(&self, address: &WalletAddress) -> (IssuedChallenge, String) {
        let challenge = IssuedChallenge {
            address: address.clone(),
            nonce: Uuid::new_v4().simple().to_string(),
            issued_at_ms: Utc::now().timestamp_millis(),
        };
        let message = challenge_message(address, &challenge.nonce, challenge.issued_at_ms);
        self.inner
            .lock()
            .unwrap()
            .put(challenge.nonce.clone(), challenge.clone());
        (challenge, message)
    }

    /// Remove and return the challenge for `nonce`, if it was issued.
    fn consume(&self, nonce: &str) -> Option<IssuedChallenge> {
        self.inner.lock().unwrap().pop(nonce)
    }

    /// Verify a signed challenge against the claimed address.
    ///
    /// Checks, in order: message shape, address binding, nonce issuance
    /// (single use), freshness, and finally signature recovery.
    pub fn verify(
        &self,
        address: &WalletAddress,
        message: &str,
        signature: &str,
    ) -> Result<(), AuthError> {
        let parsed = parse_message(message)?;
        if &parsed.address != address {
            return Err(AuthError::AddressMismatch);
        }

        let issued = self
            .consume(&parsed.nonce)
            .ok_or(AuthError::UnknownChallenge)?;
        if issued.address != parsed.address || issued.issued_at_ms != parsed.timestamp_ms {
            return Err(AuthError::UnknownChallenge);
        }

        let now_ms = Utc::now().timestamp_millis();
        let age_ms = now_ms - parsed.timestamp_ms;
        if age_ms > self.ttl.as_millis() as i64 || age_ms < -CLOCK_SKEW_MS {
            return Err(AuthError::StaleChallenge);
        }

        let recovered = recover_signer(message, signature)?;
        let claimed =
            Address::from_str(address.as_str()).map_err(|_| AuthError::AddressMismatch)?;
        if recovered != claimed {
            return Err(AuthError::AddressMismatch);
        }
        Ok(())
    }
}

/// Render the challenge message a wallet is asked to sign.
pub fn challenge_message(address: &WalletAddress, nonce: &str, timestamp_ms: i64) -> String {
    format!(
        "Sign this message to verify your wallet address: {address}\nNonce: {nonce}\nTimestamp: {timestamp_ms}"
    )
}

/// Parse a submitted challenge message back into its fields.
pub fn parse_message(message: &str) -> Result<ParsedChallenge, AuthError> {
    let mut lines = message.lines();
    let address = lines
        .next()
        .and_then(|l| l.strip_prefix("Sign this message to verify your wallet address: "))
        .ok_or(AuthError::MalformedMessage)?;
    let nonce = lines
        .next()
        .and_then(|l| l.strip_prefix("Nonce: "))
        .ok_or(AuthError::MalformedMessage)?;
    let timestamp_ms: i64 = lines
        .next()
        .and_then(|l| l.strip_prefix("Timestamp: "))
        .and_then(|t| t.parse().ok())
        .ok_or(AuthError::MalformedMessage)?;
    if lines.next().is_some() {
        return Err(AuthError::MalformedMessage);
    }
    Ok(ParsedChallenge {
        address: address.into(),
        nonce: nonce.to_string(),
        timestamp_ms,
    })
}

/// Recover the EIP-191 signer address of `message` from a hex signature.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
    let raw = signature.trim().trim_start_matches("0x");
    let bytes = alloy::hex::decode(raw).map_err(|_| AuthError::MalformedSignature)?;
    let signature =
        Signature::from_raw(&bytes).map_err(|_| AuthError::MalformedSignature)?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| AuthError::MalformedSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    fn store() -> ChallengeStore {
        ChallengeStore::new(Duration::from_secs(300))
    }

    fn sign(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", alloy::hex::encode(signature.as_bytes()))
    }

    #[test]
    fn message_round_trips_through_parse() {
        let address: WalletAddress = "0x742d35cc6634c0532925a3b8d563c0ba4a8ce3b1".into();
        let message = challenge_message(&address, "abc123", 1_767_225_600_000);
        let parsed = parse_message(&message).unwrap();
        assert_eq!(parsed.address, address);
        assert_eq!(parsed.nonce, "abc123");
        assert_eq!(parsed.timestamp_ms, 1_767_225_600_000);
    }

    #[test]
    fn garbage_messages_are_rejected() {
        assert!(matches!(
            parse_message("hello world").unwrap_err(),
            AuthError::MalformedMessage
        ));
        assert!(matches!(
            parse_message("Sign this message to verify your wallet address: 0xabc\nNonce: n")
                .unwrap_err(),
            AuthError::MalformedMessage
        ));
    }

    #[test]
    fn valid_signature_verifies() {
        let store = store();
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (_, message) = store.issue(&address);
        let signature = sign(&signer, &message);
        store.verify(&address, &message, &signature).unwrap();
    }

    #[test]
    fn challenge_is_single_use() {
        let store = store();
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (_, message) = store.issue(&address);
        let signature = sign(&signer, &message);
        store.verify(&address, &message, &signature).unwrap();

        let err = store.verify(&address, &message, &signature).unwrap_err();
        assert!(matches!(err, AuthError::UnknownChallenge));
    }

    #[test]
    fn wrong_signer_is_rejected() {
        let store = store();
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (_, message) = store.issue(&address);
        let signature = sign(&other, &message);
        let err = store.verify(&address, &message, &signature).unwrap_err();
        assert!(matches!(err, AuthError::AddressMismatch));
    }

    #[test]
    fn stale_challenge_is_rejected() {
        let store = ChallengeStore::new(Duration::from_secs(0));
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (challenge, _) = store.issue(&address);
        // Rebuild the message with a timestamp well outside the window
        let old_ms = challenge.issued_at_ms - 10 * 60 * 1000;
        let message = challenge_message(&address, &challenge.nonce, old_ms);
        let signature = sign(&signer, &message);
        let err = store.verify(&address, &message, &signature).unwrap_err();
        // Timestamp differs from the issued one, so the nonce check trips first
        assert!(matches!(
            err,
            AuthError::UnknownChallenge | AuthError::StaleChallenge
        ));
    }

    #[test]
    fn unissued_nonce_is_rejected() {
        let store = store();
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let message =
            challenge_message(&address, "never-issued", Utc::now().timestamp_millis());
        let signature = sign(&signer, &message);
        let err = store.verify(&address, &message, &signature).unwrap_err();
        assert!(matches!(err, AuthError::UnknownChallenge));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let store = store();
        let signer = PrivateKeySigner::random();
        let address = WalletAddress::new(signer.address().to_string());

        let (_, message) = store.issue(&address);
        let err = store.verify(&address, &message, "0xnothex").unwrap_err();
        assert!(matches!(err, AuthError::MalformedSignature));
    }
}
