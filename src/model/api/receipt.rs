use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{db::vote::Vote, mongodb::Id};

/// Public receipt lookup result.
///
/// Deliberately omits the voter and candidate: the endpoint proves inclusion
/// to anyone holding the hash without breaking ballot secrecy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCheck {
    pub exists: bool,
    pub post_id: Id,
    pub cast_at: DateTime<Utc>,
}

impl From<&Vote> for ReceiptCheck {
    fn from(vote: &Vote) -> Self {
        Self {
            exists: true,
            post_id: vote.post_id,
            cast_at: vote.cast_at,
        }
    }
}
