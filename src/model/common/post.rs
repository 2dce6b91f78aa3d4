use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the election post lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostState {
    /// Accepting votes while within the open window.
    Active,
    /// Hidden from voters; casting is rejected.
    Inactive,
}

impl From<PostState> for Bson {
    fn from(state: PostState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}
