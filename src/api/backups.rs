use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    audit::AuditRecorder,
    backup::BackupManager,
    broadcast::Broadcaster,
    config::Config,
    error::Result,
    model::{
        auth::AuthToken,
        db::{admin::Admin, audit::AuditAction, IctAdmin},
        mongodb::{Coll, Id},
    },
    results::ResultsAggregator,
};

use super::common::ict_by_token;

pub fn routes() -> Vec<Route> {
    routes![create_backup, restore_backup, cleanup_backups]
}

/// The response to a successful snapshot capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SnapshotCreated {
    pub snapshot_id: Id,
}

#[post("/backups")]
async fn create_backup(
    token: AuthToken<IctAdmin>,
    admins: Coll<Admin>,
    backups: &State<BackupManager>,
    audit: &State<AuditRecorder>,
) -> Result<Json<SnapshotCreated>> {
    let actor = ict_by_token(&token, &admins).await?;

    let snapshot_id = backups.create_backup().await?;

    audit.record(
        actor.username.clone(),
        AuditAction::BackupCreated,
        snapshot_id.to_string(),
        "Captured full-state snapshot".to_string(),
    );
    Ok(Json(SnapshotCreated { snapshot_id }))
}

/// Destructive: atomically replaces the entire live ledger with the snapshot
/// contents. Fails without side effects if the snapshot is missing or its
/// checksum does not match.
#[post("/backups/<snapshot_id>/restore")]
#[allow(clippy::too_many_arguments)]
async fn restore_backup(
    token: AuthToken<IctAdmin>,
    snapshot_id: Id,
    admins: Coll<Admin>,
    backups: &State<BackupManager>,
    audit: &State<AuditRecorder>,
    aggregator: &State<ResultsAggregator>,
    broadcaster: &State<Broadcaster>,
) -> Result<()> {
    let actor = ict_by_token(&token, &admins).await?;

    backups.restore_backup(snapshot_id).await?;

    // Cached aggregates may describe the replaced state; drop them all.
    aggregator.clear().await;
    broadcaster.notify_admins(format!(
        "Ledger restored from snapshot {snapshot_id} by {}",
        actor.username
    ));

    audit.record(
        actor.username.clone(),
        AuditAction::BackupRestored,
        snapshot_id.to_string(),
        "Replaced live ledger state with snapshot contents".to_string(),
    );
    Ok(())
}

/// The response to a cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CleanupOutcome {
    pub deleted: Vec<Id>,
}

#[post("/backups/cleanup")]
async fn cleanup_backups(
    token: AuthToken<IctAdmin>,
    admins: Coll<Admin>,
    backups: &State<BackupManager>,
    audit: &State<AuditRecorder>,
    config: &State<Config>,
) -> Result<Json<CleanupOutcome>> {
    let actor = ict_by_token(&token, &admins).await?;

    let deleted = backups.cleanup(&config.retention_policy()).await?;

    if !deleted.is_empty() {
        audit.record(
            actor.username.clone(),
            AuditAction::BackupCleanup,
            "backups",
            format!("Deleted {} expired snapshot(s)", deleted.len()),
        );
    }
    Ok(Json(CleanupOutcome { deleted }))
}
