use mongodb::options::FindOptions;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{AuditQuery, Paginated, Pagination},
        auth::AuthToken,
        db::{audit::AuditLogEntry, IctAdmin},
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_audit_logs]
}

/// Read-only, filtered view of the audit trail, newest first.
#[get("/audit-logs?<filters..>")]
async fn get_audit_logs(
    _token: AuthToken<IctAdmin>,
    filters: AuditQuery,
    pagination: Pagination,
    entries: Coll<AuditLogEntry>,
) -> Result<Json<Paginated<AuditLogEntry>>> {
    let filter = filters.to_filter();

    let options = FindOptions::builder()
        .sort(mongodb::bson::doc! { "logged_at": -1 })
        .skip(pagination.skip())
        .limit(pagination.page_size() as i64)
        .build();

    let page: Vec<AuditLogEntry> = entries
        .find(filter.clone(), options)
        .await?
        .try_collect()
        .await?;
    let total = entries.count_documents(filter, None).await?;

    Ok(Json(pagination.paginate(total, page)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::db::audit::{AuditAction, NewAuditLogEntry};

    use super::*;

    async fn seed_entries(db: &Database) {
        let entries = [
            NewAuditLogEntry {
                actor: "coordinator".to_string(),
                action: AuditAction::VoteInvalidated,
                target: "vote-1".to_string(),
                detail: "status PendingReview -> Invalidated".to_string(),
                logged_at: Utc::now(),
            },
            NewAuditLogEntry {
                actor: "coordinator".to_string(),
                action: AuditAction::VoteVerified,
                target: "vote-2".to_string(),
                detail: "status PendingReview -> Verified".to_string(),
                logged_at: Utc::now(),
            },
            NewAuditLogEntry {
                actor: "ict-coordinator".to_string(),
                action: AuditAction::BackupCreated,
                target: "snapshot-1".to_string(),
                detail: "Captured full-state snapshot".to_string(),
                logged_at: Utc::now(),
            },
        ];
        Coll::<NewAuditLogEntry>::from_db(db)
            .insert_many(entries, None)
            .await
            .unwrap();
    }

    #[backend_test(ict)]
    async fn unfiltered_query_returns_everything(client: Client, db: Database) {
        seed_entries(&db).await;

        let response = client.get("/audit-logs").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Paginated<AuditLogEntry> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
    }

    #[backend_test(ict)]
    async fn filters_narrow_the_result(client: Client, db: Database) {
        seed_entries(&db).await;

        let response = client
            .get("/audit-logs?actor=coordinator")
            .dispatch()
            .await;
        let page: Paginated<AuditLogEntry> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.total, 2);

        let response = client
            .get("/audit-logs?action=BackupCreated")
            .dispatch()
            .await;
        let page: Paginated<AuditLogEntry> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].target, "snapshot-1");

        let response = client
            .get("/audit-logs?action=NoSuchAction")
            .dispatch()
            .await;
        let page: Paginated<AuditLogEntry> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.total, 0);
    }

    #[backend_test(ict)]
    async fn pagination_limits_the_page(client: Client, db: Database) {
        seed_entries(&db).await;

        let response = client
            .get("/audit-logs?page_num=1&page_size=2")
            .dispatch()
            .await;
        let page: Paginated<AuditLogEntry> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
    }

    #[backend_test]
    async fn audit_query_is_privileged(client: Client, db: Database) {
        seed_entries(&db).await;

        // No ICT login: the guard forwards and nothing answers.
        let response = client.get("/audit-logs").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
