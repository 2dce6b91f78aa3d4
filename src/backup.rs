//! Full-state backup snapshots: capture, restore, retention cleanup.
//!
//! A snapshot embeds the entire ledger state (voters, posts, candidates,
//! votes, audit log) plus a SHA-256 checksum over the canonical BSON bytes of
//! that payload. Restore verifies the checksum before touching anything and
//! then replaces live state atomically; a corrupt snapshot fails the restore
//! and leaves the live ledger untouched.

use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use mongodb::{
    bson::{doc, from_document, to_document, Document},
    options::{FindOptions, SessionOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{
    db::{
        audit::AuditLogEntry,
        backup::{BackupSnapshot, BackupSnapshotCore, SnapshotData, SnapshotStatus},
        candidate::Candidate,
        post::Post,
        vote::Vote,
        voter::Voter,
    },
    mongodb::{Coll, Id, MongoCollection},
};

/// How many snapshots to keep, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Upper bound on retained snapshots.
    pub max_count: usize,
    /// Snapshots older than this are expired.
    pub max_age: Duration,
}

/// Checksum over the canonical BSON bytes of a snapshot payload document.
///
/// The BSON `Document` preserves stored field order, so the digest is stable
/// across capture and restore-time verification.
pub fn checksum_of(data_doc: &Document) -> Result<String> {
    let mut bytes = Vec::new();
    data_doc
        .to_writer(&mut bytes)
        .map_err(|err| Error::Integrity(format!("Snapshot payload not serialisable: {err}")))?;
    Ok(HEXLOWER.encode(&Sha256::digest(&bytes)))
}

/// Shared handle on the backup subsystem; cheap to clone.
#[derive(Clone)]
pub struct BackupManager {
    client: Client,
    db: Database,
}

impl BackupManager {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    /// Capture a new snapshot of the full ledger state.
    ///
    /// The snapshot document goes through the `Pending -> Complete` lifecycle;
    /// if the capture fails partway it is left `Failed` and never restorable.
    pub async fn create_backup(&self) -> Result<Id> {
        let snapshots = Coll::<BackupSnapshot>::from_db(&self.db);

        let snapshot = BackupSnapshot {
            id: Id::new(),
            snapshot: BackupSnapshotCore {
                created_at: Utc::now(),
                status: SnapshotStatus::Pending,
                checksum: String::new(),
                data: SnapshotData::default(),
            },
        };
        snapshots.insert_one(&snapshot, None).await?;

        let data = match self.capture().await {
            Ok(data) => data,
            Err(err) => {
                let update = doc! { "$set": { "status": SnapshotStatus::Failed } };
                if let Err(mark_err) = snapshots
                    .update_one(snapshot.id.as_doc(), update, None)
                    .await
                {
                    error!("Failed to mark snapshot {} failed: {mark_err}", snapshot.id);
                }
                return Err(err);
            }
        };

        let data_doc = to_document(&data).map_err(|err| Error::Db(err.into()))?;
        let checksum = checksum_of(&data_doc)?;
        let update = doc! {
            "$set": {
                "status": SnapshotStatus::Complete,
                "checksum": &checksum,
                "data": data_doc,
            }
        };
        snapshots
            .update_one(snapshot.id.as_doc(), update, None)
            .await?;

        info!("Captured backup snapshot {} ({checksum})", snapshot.id);
        Ok(snapshot.id)
    }

    /// Read a consistent view of every ledger collection.
    async fn capture(&self) -> Result<SnapshotData> {
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        // Sort by ID so the payload (and thus the checksum) is deterministic.
        let by_id = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        macro_rules! collect {
            ($t:ty) => {{
                let mut cursor = Coll::<$t>::from_db(&self.db)
                    .find_with_session(None, by_id.clone(), &mut session)
                    .await?;
                cursor.stream(&mut session).try_collect::<Vec<$t>>().await?
            }};
        }

        Ok(SnapshotData {
            voters: collect!(Voter),
            posts: collect!(Post),
            candidates: collect!(Candidate),
            votes: collect!(Vote),
            audit_log: collect!(AuditLogEntry),
        })
    }

    /// Replace the live ledger state with the given snapshot.
    ///
    /// Fails with `NotFound` if the snapshot is absent, `IntegrityFailure` if
    /// it is incomplete or its checksum does not match; in both cases the
    /// live ledger is untouched. Otherwise the replacement is atomic.
    pub async fn restore_backup(&self, snapshot_id: Id) -> Result<()> {
        // Fetch as a raw document so the payload bytes are exactly as stored.
        let raw_snapshots = self.db.collection::<Document>(BackupSnapshot::NAME);
        let raw = raw_snapshots
            .find_one(snapshot_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Backup snapshot {snapshot_id}")))?;

        let status = raw.get_str("status").unwrap_or_default();
        if status != "Complete" {
            return Err(Error::Integrity(format!(
                "Snapshot {snapshot_id} is not restorable (status {status})"
            )));
        }

        let data_doc = raw
            .get_document("data")
            .map_err(|_| Error::Integrity(format!("Snapshot {snapshot_id} has no payload")))?;
        let stored_checksum = raw.get_str("checksum").unwrap_or_default();
        let actual_checksum = checksum_of(data_doc)?;
        if stored_checksum != actual_checksum {
            return Err(Error::Integrity(format!(
                "Checksum mismatch for snapshot {snapshot_id}: \
                 recorded {stored_checksum}, computed {actual_checksum}"
            )));
        }

        let data: SnapshotData =
            from_document(data_doc.clone()).map_err(|err| Error::Db(err.into()))?;

        // Atomically swap the live state for the snapshot contents.
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        macro_rules! replace {
            ($t:ty, $docs:expr) => {{
                let coll = Coll::<$t>::from_db(&self.db);
                coll.delete_many_with_session(doc! {}, None, &mut session)
                    .await?;
                if !$docs.is_empty() {
                    coll.insert_many_with_session(&$docs, None, &mut session)
                        .await?;
                }
            }};
        }

        replace!(Voter, data.voters);
        replace!(Post, data.posts);
        replace!(Candidate, data.candidates);
        replace!(Vote, data.votes);
        replace!(AuditLogEntry, data.audit_log);

        session.commit_transaction().await?;

        warn!("Restored ledger state from snapshot {snapshot_id}");
        Ok(())
    }

    /// Delete snapshots that fall outside the retention policy, oldest first.
    /// The most recent complete snapshot is never deleted, regardless of age.
    /// Returns the IDs of the deleted snapshots.
    pub async fn cleanup(&self, policy: &RetentionPolicy) -> Result<Vec<Id>> {
        let snapshots = Coll::<BackupSnapshot>::from_db(&self.db);

        // Metadata only; the payloads can be arbitrarily large.
        let options = FindOptions::builder()
            .projection(doc! { "data": 0 })
            .sort(doc! { "created_at": -1 })
            .build();
        let all: Vec<BackupSnapshot> = snapshots.find(None, options).await?.try_collect().await?;

        let metas: Vec<SnapshotMeta> = all
            .iter()
            .map(|s| SnapshotMeta {
                id: s.id,
                created_at: s.created_at,
                status: s.status,
            })
            .collect();
        let expired = select_expired(&metas, policy, Utc::now());
        if expired.is_empty() {
            return Ok(expired);
        }

        let ids: Vec<_> = expired.iter().map(|id| **id).collect();
        snapshots
            .delete_many(doc! { "_id": { "$in": ids } }, None)
            .await?;

        info!("Backup cleanup deleted {} snapshot(s)", expired.len());
        Ok(expired)
    }
}

/// The retention-relevant part of a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotMeta {
    pub id: Id,
    pub created_at: DateTime<Utc>,
    pub status: SnapshotStatus,
}

/// Pick the snapshots to delete under the given policy.
///
/// `snapshots` must be sorted newest first. Returns expired IDs oldest first.
pub fn select_expired(
    snapshots: &[SnapshotMeta],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<Id> {
    // The newest complete snapshot survives no matter what.
    let protected = snapshots
        .iter()
        .find(|s| s.status == SnapshotStatus::Complete)
        .map(|s| s.id);

    let mut expired: Vec<Id> = snapshots
        .iter()
        .enumerate()
        .filter(|(position, s)| {
            *position >= policy.max_count || now - s.created_at > policy.max_age
        })
        .map(|(_, s)| s.id)
        .filter(|id| Some(*id) != protected)
        .collect();

    // Delete oldest first.
    expired.reverse();
    expired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(age_hours: i64, status: SnapshotStatus) -> SnapshotMeta {
        SnapshotMeta {
            id: Id::new(),
            created_at: Utc::now() - Duration::hours(age_hours),
            status,
        }
    }

    fn policy(max_count: usize, max_age_hours: i64) -> RetentionPolicy {
        RetentionPolicy {
            max_count,
            max_age: Duration::hours(max_age_hours),
        }
    }

    #[test]
    fn keeps_everything_within_policy() {
        let snapshots = vec![
            meta(1, SnapshotStatus::Complete),
            meta(2, SnapshotStatus::Complete),
        ];
        assert!(select_expired(&snapshots, &policy(5, 24), Utc::now()).is_empty());
    }

    #[test]
    fn expires_beyond_count_oldest_first() {
        let snapshots = vec![
            meta(1, SnapshotStatus::Complete),
            meta(2, SnapshotStatus::Complete),
            meta(3, SnapshotStatus::Complete),
            meta(4, SnapshotStatus::Complete),
        ];
        let expired = select_expired(&snapshots, &policy(2, 240), Utc::now());
        assert_eq!(expired, vec![snapshots[3].id, snapshots[2].id]);
    }

    #[test]
    fn expires_beyond_age() {
        let snapshots = vec![
            meta(1, SnapshotStatus::Complete),
            meta(48, SnapshotStatus::Complete),
        ];
        let expired = select_expired(&snapshots, &policy(10, 24), Utc::now());
        assert_eq!(expired, vec![snapshots[1].id]);
    }

    #[test]
    fn newest_complete_snapshot_is_immortal() {
        // Everything is ancient, but the newest complete snapshot survives.
        let snapshots = vec![
            meta(100, SnapshotStatus::Failed),
            meta(200, SnapshotStatus::Complete),
            meta(300, SnapshotStatus::Complete),
        ];
        let expired = select_expired(&snapshots, &policy(1, 24), Utc::now());
        assert_eq!(expired, vec![snapshots[2].id, snapshots[0].id]);
    }

    #[test]
    fn failed_snapshots_get_no_protection() {
        let snapshots = vec![meta(100, SnapshotStatus::Failed)];
        let expired = select_expired(&snapshots, &policy(5, 24), Utc::now());
        assert_eq!(expired, vec![snapshots[0].id]);
    }

    #[test]
    fn checksum_is_order_sensitive() {
        let doc_a = doc! { "votes": [], "voters": [{"username": "S001"}] };
        let doc_b = doc! { "voters": [{"username": "S001"}], "votes": [] };
        let doc_a2 = doc! { "votes": [], "voters": [{"username": "S001"}] };
        assert_eq!(
            checksum_of(&doc_a).unwrap(),
            checksum_of(&doc_a2).unwrap()
        );
        assert_ne!(checksum_of(&doc_a).unwrap(), checksum_of(&doc_b).unwrap());
    }
}
