use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::PostState, mongodb::Id};

/// Core election post data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCore {
    pub title: String,
    pub state: PostState,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub open_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub close_at: DateTime<Utc>,
}

impl PostCore {
    /// Is this post currently accepting votes?
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.state == PostState::Active && self.open_at <= now && now < self.close_at
    }
}

/// An election post from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub post: PostCore,
}

impl Deref for Post {
    type Target = PostCore;

    fn deref(&self) -> &Self::Target {
        &self.post
    }
}

impl DerefMut for Post {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.post
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Post {
        /// A post that is currently open for voting.
        pub fn open_example() -> Self {
            Self {
                id: Id::new(),
                post: PostCore {
                    title: "Head Prefect".to_string(),
                    state: PostState::Active,
                    open_at: Utc::now() - Duration::hours(1),
                    close_at: Utc::now() + Duration::hours(1),
                },
            }
        }

        /// A post whose voting window has already closed.
        pub fn closed_example() -> Self {
            Self {
                id: Id::new(),
                post: PostCore {
                    title: "Sports Captain".to_string(),
                    state: PostState::Active,
                    open_at: Utc::now() - Duration::hours(2),
                    close_at: Utc::now() - Duration::hours(1),
                },
            }
        }

        /// A post that has been deactivated by an administrator.
        pub fn inactive_example() -> Self {
            Self {
                id: Id::new(),
                post: PostCore {
                    title: "Librarian".to_string(),
                    state: PostState::Inactive,
                    open_at: Utc::now() - Duration::hours(1),
                    close_at: Utc::now() + Duration::hours(1),
                },
            }
        }
    }
}
