use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::VoteStatus, mongodb::Id};

/// Core vote data, as stored in the database.
///
/// Immutable once committed, except for `status`/`invalidation_reason` which
/// only privileged audit actions may set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub post_id: Id,
    pub candidate_id: Id,
    /// Proof-of-inclusion digest handed back to the voter.
    pub receipt_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    pub status: VoteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_reason: Option<String>,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Vote {
    /// Assemble a freshly-cast vote. The ID is generated here so the receipt
    /// can be computed over the final identity before the insert.
    pub fn new(voter_id: Id, post_id: Id, candidate_id: Id, cast_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            vote: VoteCore {
                voter_id,
                post_id,
                candidate_id,
                receipt_hash: String::new(),
                cast_at,
                status: VoteStatus::PendingReview,
                invalidation_reason: None,
            },
        }
    }
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}
