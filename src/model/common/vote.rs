use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Review states in the vote lifecycle.
///
/// A committed vote is immutable apart from this field, which only privileged
/// audit actions may move. `Invalidated` excludes the vote from tallies but
/// never frees the `(voter, post)` slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteStatus {
    /// Committed, counted, not yet inspected by an auditor.
    PendingReview,
    /// Receipt re-checked by an admin; counted.
    Verified,
    /// Flagged by an admin for transparency audits; excluded from tallies.
    Invalidated,
}

impl From<VoteStatus> for Bson {
    fn from(status: VoteStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
