use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::audit::{AuditRecorder, SYSTEM_ACTOR};
use crate::backup::{BackupManager, RetentionPolicy};
use crate::broadcast::Broadcaster;
use crate::model::db::{admin::ensure_admins_exist, audit::AuditAction};
use crate::model::mongodb::{ensure_indexes_exist, Coll};
use crate::results::ResultsAggregator;
use crate::scheduled_task::ScheduledTask;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    backup_max_count: u32,
    backup_max_age_days: u32,
    backup_cleanup_interval: u64,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key for receipt HMACs.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }

    /// Snapshot retention rules for backup cleanup.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_count: self.backup_max_count as usize,
            max_age: Duration::days(self.backup_max_age_days.into()),
        }
    }

    /// How long to wait between scheduled backup cleanup runs.
    pub fn backup_cleanup_interval(&self) -> Duration {
        Duration::seconds(self.backup_cleanup_interval as i64)
    }
}

#[cfg(test)]
impl Config {
    /// A fixed config for unit tests that never touch rocket's figment.
    pub fn test_config() -> Self {
        Self {
            auth_ttl: 3600,
            backup_max_count: 14,
            backup_max_age_days: 30,
            backup_cleanup_interval: 86400,
            jwt_secret: "insecure-test-jwt-secret".to_string(),
            hmac_secret: "insecure-test-hmac-secret".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places the ledger handles (`Client`,
/// `Database`, the audit recorder and the backup manager) into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist; the vote slot index is the
        // correctness anchor for one-vote-per-post.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to set up database indexes: {e}");
            return Err(rocket);
        }

        // Ensure both admin tiers have at least one account.
        if let Err(e) = ensure_admins_exist(&Coll::from_db(&db)).await {
            error!("Failed to set up admin accounts: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let audit = AuditRecorder::new(&db);
        let backups = BackupManager::new(client.clone(), db.clone());
        rocket = rocket
            .manage(client)
            .manage(db)
            .manage(audit)
            .manage(backups);
        Ok(rocket)
    }
}

/// A fairing that constructs the realtime broadcaster and the results
/// aggregator with an explicit lifecycle: created once here, passed around as
/// managed state, gone when the server shuts down. Requires the database
/// fairing to have run first.
pub struct BroadcastFairing;

#[rocket::async_trait]
impl Fairing for BroadcastFairing {
    fn info(&self) -> Info {
        Info {
            name: "Realtime broadcast",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let db = match rocket.state::<mongodb::Database>() {
            Some(db) => db.clone(),
            None => {
                error!("Broadcast fairing requires the database fairing to run first");
                return Err(rocket);
            }
        };
        Ok(rocket
            .manage(Broadcaster::new())
            .manage(ResultsAggregator::new(db)))
    }
}

/// A fairing that schedules recurring backup cleanup according to the
/// configured retention policy. Each run is audited as the system actor.
pub struct BackupSchedulerFairing;

#[rocket::async_trait]
impl Fairing for BackupSchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Backup cleanup scheduler",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(config), Some(backups), Some(audit)) = (
            rocket.state::<Config>(),
            rocket.state::<BackupManager>(),
            rocket.state::<AuditRecorder>(),
        ) else {
            warn!("Backup scheduler not started: missing managed state");
            return;
        };

        let interval = config.backup_cleanup_interval();
        let policy = config.retention_policy();
        let backups = backups.clone();
        let audit = audit.clone();

        info!(
            "Scheduling backup cleanup every {}s (keep {} snapshots, max age {} days)",
            interval.num_seconds(),
            policy.max_count,
            policy.max_age.num_days()
        );
        rocket::tokio::spawn(async move {
            loop {
                let run = scheduled_cleanup(backups.clone(), audit.clone(), policy);
                if ScheduledTask::after(run, interval).await.is_err() {
                    // Only happens if the runtime is tearing down.
                    break;
                }
            }
        });
    }
}

/// One scheduled cleanup run.
async fn scheduled_cleanup(backups: BackupManager, audit: AuditRecorder, policy: RetentionPolicy) {
    match backups.cleanup(&policy).await {
        Ok(deleted) if deleted.is_empty() => {}
        Ok(deleted) => {
            audit.record(
                SYSTEM_ACTOR,
                AuditAction::BackupCleanup,
                "backups",
                format!("Deleted {} expired snapshot(s)", deleted.len()),
            );
        }
        Err(err) => error!("Scheduled backup cleanup failed: {err}"),
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "ballotbox".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
