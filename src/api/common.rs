use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    auth::AuthToken,
    db::admin::{Admin, IctAdmin},
    mongodb::Coll,
};

/// Resolve an admin token back to its account, for audit actor names.
pub async fn admin_by_token(token: &AuthToken<Admin>, admins: &Coll<Admin>) -> Result<Admin> {
    admins
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::unauthorized("Admin account no longer exists"))
}

/// Resolve an ICT token back to its account, for audit actor names.
pub async fn ict_by_token(token: &AuthToken<IctAdmin>, admins: &Coll<Admin>) -> Result<Admin> {
    admins
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::unauthorized("ICT admin account no longer exists"))
}
