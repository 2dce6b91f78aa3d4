use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::{audit::AuditLogEntry, candidate::Candidate, post::Post, vote::Vote, voter::Voter},
    mongodb::Id,
};

/// Lifecycle states of a backup snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    /// Created, capture still in progress.
    Pending,
    /// Capture finished and checksummed; restorable.
    Complete,
    /// Capture aborted; never restorable, eligible for cleanup.
    Failed,
}

impl From<SnapshotStatus> for Bson {
    fn from(status: SnapshotStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// The full ledger state captured by a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    pub voters: Vec<Voter>,
    pub posts: Vec<Post>,
    pub candidates: Vec<Candidate>,
    pub votes: Vec<Vote>,
    pub audit_log: Vec<AuditLogEntry>,
}

/// Core backup snapshot data, as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshotCore {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub status: SnapshotStatus,
    /// Hex SHA-256 over the canonical BSON serialisation of `data`.
    pub checksum: String,
    /// The payload is defaulted so metadata-only reads (cleanup listings)
    /// can project it away.
    #[serde(default)]
    pub data: SnapshotData,
}

/// A snapshot without an ID.
pub type NewBackupSnapshot = BackupSnapshotCore;

/// A backup snapshot from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub snapshot: BackupSnapshotCore,
}

impl Deref for BackupSnapshot {
    type Target = BackupSnapshotCore;

    fn deref(&self) -> &Self::Target {
        &self.snapshot
    }
}

impl DerefMut for BackupSnapshot {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.snapshot
    }
}
