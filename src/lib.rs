#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod audit;
pub mod backup;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod receipt;
pub mod results;
pub mod scheduled_task;
pub mod voting;

pub use config::Config;

/// Assemble the server: logging, config, ledger store, realtime broadcast and
/// the backup cleanup scheduler, plus all routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::BroadcastFairing)
        .attach(config::BackupSchedulerFairing)
        .mount("/", api::routes())
}

/// Connect to the test database server configured in `Rocket.toml`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// A fresh random database name, so tests cannot collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    format!("test{}", rand::random::<u32>())
}

/// Build a server against a specific (test) database, with the same managed
/// state as production but no background scheduler.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to set up test database indexes");
    model::db::admin::ensure_admins_exist(&model::mongodb::Coll::from_db(&db))
        .await
        .expect("Failed to set up test admin accounts");

    rocket::build()
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .manage(client.clone())
        .manage(db.clone())
        .manage(audit::AuditRecorder::new(&db))
        .manage(backup::BackupManager::new(client, db))
        .attach(config::BroadcastFairing)
        .mount("/", api::routes())
}
