use std::ops::{Deref, DerefMut};

use mongodb::error::Error as DbError;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ICT_USERNAME: &str = "ict-admin";

/// The well-known password both default accounts start with.
/// Deployments must change it immediately after first launch.
pub const DEFAULT_PASSWORD: &str = "insecure-default-password";

/// Privileged tiers within the admin collection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminRole {
    /// Election administrator: monitors results, reviews votes.
    Admin,
    /// ICT administrator: system integrity (backups, audit, reset).
    Ict,
}

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// An admin confirmed to hold the ICT role. Constructed only by the login
/// path after the role check, so an `AuthToken<IctAdmin>` proves the tier.
#[derive(Debug)]
pub struct IctAdmin(pub Admin);

impl Deref for IctAdmin {
    type Target = Admin;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Ensure both admin tiers have at least one account, creating the default
/// accounts if the collection is empty.
///
/// This operation is idempotent.
pub async fn ensure_admins_exist(admins: &Coll<NewAdmin>) -> Result<(), DbError> {
    if admins.count_documents(None, None).await? > 0 {
        return Ok(());
    }

    warn!(
        "No admin accounts exist; creating '{DEFAULT_ADMIN_USERNAME}' and \
         '{DEFAULT_ICT_USERNAME}' with the well-known default password. \
         Change it immediately."
    );
    let salt: [u8; 16] = rand::random();
    let password_hash =
        argon2::hash_encoded(DEFAULT_PASSWORD.as_bytes(), &salt, &argon2::Config::default())
            .expect("argon2 parameters are valid");
    let defaults = [
        NewAdmin {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password_hash: password_hash.clone(),
            role: AdminRole::Admin,
        },
        NewAdmin {
            username: DEFAULT_ICT_USERNAME.to_string(),
            password_hash,
            role: AdminRole::Ict,
        },
    ];
    admins.insert_many(defaults, None).await?;
    Ok(())
}

/// Example data for tests. The hashes are argon2 encodings of
/// "admin-password" and "ict-password" respectively.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCore {
        pub fn example() -> Self {
            Self {
                username: "coordinator".to_string(),
                password_hash: argon2::hash_encoded(
                    b"admin-password",
                    b"insecure-test-salt",
                    &argon2::Config::default(),
                )
                .unwrap(),
                role: AdminRole::Admin,
            }
        }

        pub fn example_ict() -> Self {
            Self {
                username: "ict-coordinator".to_string(),
                password_hash: argon2::hash_encoded(
                    b"ict-password",
                    b"insecure-test-salt",
                    &argon2::Config::default(),
                )
                .unwrap(),
                role: AdminRole::Ict,
            }
        }
    }
}
