use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
///
/// Votes reference candidates that were active at cast time; deactivating a
/// candidate afterwards does not retroactively invalidate those votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The post this candidate is standing for.
    pub post_id: Id,
    pub name: String,
    pub active: bool,
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidate {
        pub fn example_for(post_id: Id, name: &str) -> Self {
            Self {
                id: Id::new(),
                candidate: CandidateCore {
                    post_id,
                    name: name.to_string(),
                    active: true,
                },
            }
        }
    }
}
