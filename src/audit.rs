//! Append-only audit trail for privileged state changes.
//!
//! Recording is fire-and-forget: the write happens on a spawned task so audit
//! store health never adds latency to, or fails, the operation being audited.
//! A failed write is logged for operational follow-up, never silently
//! swallowed, and never rolled back into the primary transaction.

use chrono::Utc;
use mongodb::Database;
use rocket::tokio::{self, task::JoinHandle};

use crate::model::{
    db::audit::{AuditAction, NewAuditLogEntry},
    mongodb::Coll,
};

/// Actor name recorded for scheduled (non-interactive) actions.
pub const SYSTEM_ACTOR: &str = "system";

/// Shared handle on the audit trail; cheap to clone.
#[derive(Clone)]
pub struct AuditRecorder {
    entries: Coll<NewAuditLogEntry>,
}

impl AuditRecorder {
    pub fn new(db: &Database) -> Self {
        Self {
            entries: Coll::from_db(db),
        }
    }

    /// Append an audit entry without blocking the caller.
    ///
    /// The returned handle can be awaited where deterministic ordering is
    /// needed (tests); callers on the request path just drop it.
    pub fn record(
        &self,
        actor: impl Into<String>,
        action: AuditAction,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> JoinHandle<()> {
        let entry = NewAuditLogEntry {
            actor: actor.into(),
            action,
            target: target.into(),
            detail: detail.into(),
            logged_at: Utc::now(),
        };
        let entries = self.entries.clone();
        tokio::spawn(async move {
            if let Err(err) = entries.insert_one(&entry, None).await {
                error!(
                    "Audit write failed for {:?} on {} by {}: {err}",
                    entry.action, entry.target, entry.actor
                );
            }
        })
    }
}
