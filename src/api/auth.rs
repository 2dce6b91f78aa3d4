use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{AdminCredentials, VoterCredentials},
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        db::{
            admin::{Admin, AdminRole, IctAdmin},
            voter::Voter,
        },
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![authenticate_admin, authenticate_ict, authenticate_voter, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let admin = admin_with_credentials(&credentials, AdminRole::Admin, &admins).await?;
    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config));
    Ok(())
}

#[post("/auth/ict", data = "<credentials>", format = "json")]
async fn authenticate_ict(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let admin = admin_with_credentials(&credentials, AdminRole::Ict, &admins).await?;
    let token = AuthToken::new(&IctAdmin(admin));
    cookies.add(token.into_cookie(config));
    Ok(())
}

#[post("/auth/voter", data = "<credentials>", format = "json")]
async fn authenticate_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<()> {
    let voter = voters
        .find_one(doc! { "username": &credentials.username }, None)
        .await?
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized("No voter found with the provided username and password")
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config));
    Ok(())
}

#[post("/auth/logout")]
async fn logout(cookies: &CookieJar<'_>) -> Result<()> {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Ok(())
}

/// Look up an admin-tier account, verifying the password and the tier.
async fn admin_with_credentials(
    credentials: &AdminCredentials,
    role: AdminRole,
    admins: &Coll<Admin>,
) -> Result<Admin> {
    admins
        .find_one(doc! { "username": &credentials.username }, None)
        .await?
        .filter(|admin| admin.role == role)
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized("No account found with the provided username and password")
        })
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };

    use crate::model::db::admin::NewAdmin;
    use crate::model::db::voter::NewVoter;

    use super::*;

    #[backend_test]
    async fn admin_login_round_trip(client: Client, admins: Coll<NewAdmin>) {
        admins
            .insert_one(NewAdmin::example(), None)
            .await
            .unwrap();

        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(rocket::serde::json::json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        // Logging out removes the cookie.
        let response = client.post(uri!(logout)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }

    #[backend_test]
    async fn wrong_password_is_rejected(client: Client, admins: Coll<NewAdmin>) {
        admins
            .insert_one(NewAdmin::example(), None)
            .await
            .unwrap();

        let mut credentials = AdminCredentials::example();
        credentials.password = "wrong".to_string();
        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(rocket::serde::json::json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn admin_credentials_do_not_grant_ict(client: Client, admins: Coll<NewAdmin>) {
        admins
            .insert_one(NewAdmin::example(), None)
            .await
            .unwrap();

        // Correct password, wrong tier.
        let response = client
            .post(uri!(authenticate_ict))
            .header(ContentType::JSON)
            .body(rocket::serde::json::json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn voter_login(client: Client, _db: Database, voters: Coll<NewVoter>) {
        voters
            .insert_one(NewVoter::example(), None)
            .await
            .unwrap();

        let response = client
            .post(uri!(authenticate_voter))
            .header(ContentType::JSON)
            .body(
                rocket::serde::json::json!(crate::model::api::VoterCredentials::example())
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }
}
