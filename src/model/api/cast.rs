use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{db::vote::Vote, mongodb::Id};

/// A vote that the user wishes to cast: a specific candidate for a specific post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastRequest {
    pub post_id: Id,
    pub candidate_id: Id,
}

/// The response to a successful cast: everything the voter needs to later
/// prove their vote was included, and nothing that reveals it to others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastReceipt {
    pub vote_id: Id,
    pub receipt_hash: String,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for CastReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id,
            receipt_hash: vote.vote.receipt_hash,
            cast_at: vote.vote.cast_at,
        }
    }
}
