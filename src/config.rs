// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the embedded database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `ADMIN_ADDRESSES` | Comma-separated wallet addresses granted the admin flag on first sign-in | empty |
//! | `CHALLENGE_TTL_SECS` | Freshness window for signed challenges | `300` |
//! | `SESSION_TTL_SECS` | Server-side session lifetime | `3600` |
//! | `RECONCILE_INTERVAL_SECS` | Interval between settlement reconciliation sweeps | `60` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the admin address allow-list.
pub const ADMIN_ADDRESSES_ENV: &str = "ADMIN_ADDRESSES";

/// Supported networks as `(canonical name, token symbol)` pairs.
///
/// Earnings are attributed to exactly these networks; aggregate queries
/// always report the full list, zero-filled.
pub const SUPPORTED_NETWORKS: &[(&str, &str)] = &[
    ("Ethereum", "ETH"),
    ("BNB Chain", "BNB"),
    ("Polygon", "MATIC"),
    ("Arbitrum", "ARB"),
    ("Base", "BASE"),
    ("Avalanche", "AVAX"),
    ("Optimism", "OP"),
];

/// Runtime configuration shared across the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lowercase wallet addresses that receive the admin flag when their
    /// user record is first created.
    pub admin_addresses: HashSet<String>,
    /// Maximum age of a signed challenge before it is rejected as stale.
    pub challenge_ttl: Duration,
    /// Server-side session lifetime.
    pub session_ttl: Duration,
    /// Interval between settlement reconciliation sweeps.
    pub reconcile_interval: Duration,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            admin_addresses: env::var(ADMIN_ADDRESSES_ENV)
                .unwrap_or_default()
                .split(',')
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
            challenge_ttl: Duration::from_secs(secs_var("CHALLENGE_TTL_SECS", 300)),
            session_ttl: Duration::from_secs(secs_var("SESSION_TTL_SECS", 3600)),
            reconcile_interval: Duration::from_secs(secs_var("RECONCILE_INTERVAL_SECS", 60)),
        }
    }

    /// Canonical network name for `network`, matched case-insensitively.
    pub fn canonical_network(&self, network: &str) -> Option<&'static str> {
        let wanted = network.trim();
        SUPPORTED_NETWORKS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(name, _)| *name)
    }

    /// Whether `address` (any case) is on the admin allow-list.
    pub fn is_admin_address(&self, address: &str) -> bool {
        self.admin_addresses.contains(&address.to_lowercase())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_addresses: HashSet::new(),
            challenge_ttl: Duration::from_secs(300),
            session_ttl: Duration::from_secs(3600),
            reconcile_interval: Duration::from_secs(60),
        }
    }
}

fn secs_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_network_is_case_insensitive() {
        let config = Config::default();
        assert_eq!(config.canonical_network("ethereum"), Some("Ethereum"));
        assert_eq!(config.canonical_network("BNB CHAIN"), Some("BNB Chain"));
        assert_eq!(config.canonical_network(" polygon "), Some("Polygon"));
        assert_eq!(config.canonical_network("Solana"), None);
    }

    #[test]
    fn admin_allow_list_matches_any_case() {
        let mut config = Config::default();
        config
            .admin_addresses
            .insert("0x742d35cc6634c0532925a3b8d563c0ba4a8ce3b1".into());
        assert!(config.is_admin_address("0x742D35Cc6634C0532925a3b8D563C0bA4a8cE3B1"));
        assert!(!config.is_admin_address("0xother"));
    }

    #[test]
    fn network_list_has_no_duplicates() {
        let mut names: Vec<&str> = SUPPORTED_NETWORKS.iter().map(|(n, _)| *n).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), SUPPORTED_NETWORKS.len());
    }
}
