// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Affiliate Ledger

//! Audit logging for privileged and security-sensitive operations.
//!
//! Every privileged mutation (settlement, rejection, user deletion, earning
//! credits) and every sign-in is appended here with the acting user and,
//! for balance mutations, the prior and new values, so the books can be
//! replayed forensically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::db::{LedgerDb, LedgerDbResult, AUDIT_LOG};
use redb::{ReadableDatabase, ReadableTable};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Identity events
    UserCreated,
    UserDeleted,
    SignIn,
    AuthFailure,

    // Ledger events
    EarningRecorded,

    // Withdrawal events
    WithdrawalRequested,
    SettlementStarted,
    SettlementCompleted,
    SettlementRejected,

    // Admin events
    AdminAccess,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub actor_id: Option<String>,
    /// Resource affected (user_id, withdrawal_id, ...).
    pub resource_id: Option<String>,
    /// Resource type (user, withdrawal, earning_event).
    pub resource_type: Option<String>,
    /// Additional details as JSON (prior/new values for balance mutations).
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the acting user.
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Set the affected resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with an error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

impl LedgerDb {
    /// Append an audit event.
    pub fn record_audit(&self, event: &AuditEvent) -> LedgerDbResult<()> {
        let json = serde_json::to_vec(event)?;
        let mut key = Vec::with_capacity(8 + 1 + event.event_id.len());
        key.extend_from_slice(&(!event.timestamp.timestamp_micros() as u64).to_be_bytes());
        key.push(b'|');
        key.extend_from_slice(event.event_id.as_bytes());

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_LOG)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Append an audit event, logging instead of failing on error.
    ///
    /// An audit write failure must not fail the audited operation itself.
    pub fn log_audit(&self, event: AuditEvent) {
        if let Err(e) = self.record_audit(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %e,
                "Failed to record audit event"
            );
        }
    }

    /// The most recent audit events, newest first.
    pub fn recent_audit(&self, limit: usize) -> LedgerDbResult<Vec<AuditEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;
        let mut events = Vec::new();
        for item in table.iter()? {
            if events.len() >= limit {
                break;
            }
            let (_, value) = item?;
            events.push(serde_json::from_slice::<AuditEvent>(value.value())?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_db() -> (TempDir, LedgerDb) {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(&dir.path().join("ledger.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::SettlementCompleted)
            .with_actor("admin-1")
            .with_resource("withdrawal", "w-1")
            .with_details(serde_json::json!({ "prior_total_earned": 1.5 }));
        assert_eq!(event.actor_id.as_deref(), Some("admin-1"));
        assert_eq!(event.resource_type.as_deref(), Some("withdrawal"));
        assert!(event.success);

        let failed = AuditEvent::new(AuditEventType::AuthFailure).failed("bad signature");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("bad signature"));
    }

    #[test]
    fn events_come_back_newest_first() {
        let (_dir, db) = open_db();
        for i in 0..3 {
            let mut event = AuditEvent::new(AuditEventType::AdminAccess).with_actor("admin-1");
            event.timestamp = Utc::now() + chrono::Duration::milliseconds(i);
            db.record_audit(&event).unwrap();
        }

        let events = db.recent_audit(10).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].timestamp >= events[1].timestamp);
        assert!(events[1].timestamp >= events[2].timestamp);

        let limited = db.recent_audit(2).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
