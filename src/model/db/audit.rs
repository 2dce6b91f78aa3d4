use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The privileged state changes that produce an audit entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    VoteVerified,
    VoteInvalidated,
    BackupCreated,
    BackupRestored,
    BackupCleanup,
    SystemReset,
}

impl From<AuditAction> for Bson {
    fn from(action: AuditAction) -> Self {
        to_bson(&action).expect("Serialisation is infallible")
    }
}

/// Core audit entry data: who did what to which entity.
///
/// Append-only. Entries are never mutated, and only deleted by a
/// whole-system reset (which is itself audited).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntryCore {
    /// Username of the acting admin, or "system" for scheduled actions.
    pub actor: String,
    pub action: AuditAction,
    /// Identifier of the affected entity (vote ID, snapshot ID, ...).
    pub target: String,
    /// Free-form before/after summary.
    pub detail: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub logged_at: DateTime<Utc>,
}

/// An audit entry without an ID.
pub type NewAuditLogEntry = AuditLogEntryCore;

/// An audit entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: AuditLogEntryCore,
}

impl Deref for AuditLogEntry {
    type Target = AuditLogEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
