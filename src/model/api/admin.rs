use serde::{Deserialize, Serialize};

/// Login credentials for an admin-tier user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Login credentials for a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCredentials {
    pub username: String,
    pub password: String,
}
