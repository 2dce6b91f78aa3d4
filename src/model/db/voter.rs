use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_string_map, Id};

/// Core voter data, as stored in the database.
///
/// `voted` is a denormalised summary for quick "has voted" reads, keyed by
/// post ID. The authoritative record is the votes collection; the summary is
/// written inside the same transaction that commits a vote, so the two can
/// never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub username: String,
    pub password_hash: String,
    #[serde(with = "serde_string_map")]
    pub voted: HashMap<Id, DateTime<Utc>>,
}

impl VoterCore {
    /// Create a new voter with an empty voting record.
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
            voted: HashMap::new(),
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// Has this voter's summary recorded a vote for the given post?
    pub fn has_voted_for(&self, post_id: Id) -> bool {
        self.voted.contains_key(&post_id)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests. Password is "voter-password".
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example() -> Self {
            Self::new(
                "S001".to_string(),
                argon2::hash_encoded(
                    b"voter-password",
                    b"insecure-test-salt",
                    &argon2::Config::default(),
                )
                .unwrap(),
            )
        }

        pub fn example2() -> Self {
            Self::new(
                "S002".to_string(),
                argon2::hash_encoded(
                    b"voter-password",
                    b"insecure-test-salt",
                    &argon2::Config::default(),
                )
                .unwrap(),
            )
        }
    }
}
