use mongodb::{bson::doc, Client};
use rocket::{Route, State};

use crate::{
    audit::AuditRecorder,
    broadcast::Broadcaster,
    error::Result,
    model::{
        auth::AuthToken,
        db::{
            admin::Admin,
            audit::{AuditAction, AuditLogEntry},
            vote::Vote,
            voter::Voter,
            IctAdmin,
        },
        mongodb::Coll,
    },
    results::ResultsAggregator,
};

use super::common::ict_by_token;

pub fn routes() -> Vec<Route> {
    routes![reset]
}

/// Whole-system reset: wipes all votes, clears every voter's summary and
/// deletes the audit history, in one transaction. Succeeds fully or not at
/// all. The reset itself becomes the first entry of the fresh audit log.
#[post("/system/reset")]
#[allow(clippy::too_many_arguments)]
async fn reset(
    token: AuthToken<IctAdmin>,
    admins: Coll<Admin>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
    entries: Coll<AuditLogEntry>,
    db_client: &State<Client>,
    audit: &State<AuditRecorder>,
    aggregator: &State<ResultsAggregator>,
    broadcaster: &State<Broadcaster>,
) -> Result<()> {
    let actor = ict_by_token(&token, &admins).await?;

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let removed_votes = votes
        .delete_many_with_session(doc! {}, None, &mut session)
        .await?
        .deleted_count;
    voters
        .update_many_with_session(doc! {}, doc! { "$set": { "voted": {} } }, None, &mut session)
        .await?;
    entries
        .delete_many_with_session(doc! {}, None, &mut session)
        .await?;

    session.commit_transaction().await?;

    warn!("System reset by {}: {removed_votes} vote(s) wiped", actor.username);
    aggregator.clear().await;
    broadcaster.notify_admins(format!("System reset performed by {}", actor.username));

    audit.record(
        actor.username.clone(),
        AuditAction::SystemReset,
        "system".to_string(),
        format!("Wiped {removed_votes} vote(s), voter summaries and audit history"),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::db::{
        audit::{AuditLogEntry, NewAuditLogEntry},
        candidate::Candidate,
        post::Post,
        voter::NewVoter,
    };
    use crate::{config::Config, receipt};

    use super::*;

    #[backend_test(ict)]
    async fn reset_wipes_votes_summaries_and_history(client: Client, db: Database) {
        let config = client.rocket().state::<Config>().unwrap();

        // A voter with a committed vote and a matching summary.
        let post = Post::open_example();
        Coll::<Post>::from_db(&db)
            .insert_one(&post, None)
            .await
            .unwrap();
        let candidate = Candidate::example_for(post.id, "Alice");
        Coll::<Candidate>::from_db(&db)
            .insert_one(&candidate, None)
            .await
            .unwrap();
        let voter_id = Coll::<NewVoter>::from_db(&db)
            .insert_one(NewVoter::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let mut vote = Vote::new(voter_id, post.id, candidate.id, Utc::now());
        vote.receipt_hash = receipt::compute_receipt(&vote, config);
        Coll::<Vote>::from_db(&db)
            .insert_one(&vote, None)
            .await
            .unwrap();
        Coll::<Voter>::from_db(&db)
            .update_one(
                doc! { "_id": *voter_id },
                doc! { "$set": { format!("voted.{}", post.id): "2026-01-01T00:00:00Z" } },
                None,
            )
            .await
            .unwrap();
        Coll::<NewAuditLogEntry>::from_db(&db)
            .insert_one(
                NewAuditLogEntry {
                    actor: "coordinator".to_string(),
                    action: crate::model::db::audit::AuditAction::VoteVerified,
                    target: vote.id.to_string(),
                    detail: "old history".to_string(),
                    logged_at: Utc::now(),
                },
                None,
            )
            .await
            .unwrap();

        let response = client.post(uri!(reset)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        // Votes and summaries are gone; posts and candidates survive.
        assert_eq!(
            Coll::<Vote>::from_db(&db)
                .count_documents(None, None)
                .await
                .unwrap(),
            0
        );
        let voter = Coll::<Voter>::from_db(&db)
            .find_one(doc! { "_id": *voter_id }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.voted.is_empty());
        assert_eq!(
            Coll::<Post>::from_db(&db)
                .count_documents(None, None)
                .await
                .unwrap(),
            1
        );

        // The fresh audit log eventually contains exactly the reset entry.
        rocket::tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let entries: Vec<AuditLogEntry> = {
            use rocket::futures::TryStreamExt;
            Coll::<AuditLogEntry>::from_db(&db)
                .find(None, None)
                .await
                .unwrap()
                .try_collect()
                .await
                .unwrap()
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].action,
            crate::model::db::audit::AuditAction::SystemReset
        );
        assert_eq!(entries[0].actor, "ict-coordinator");
    }

    #[backend_test(admin)]
    async fn reset_requires_the_ict_tier(client: Client, _db: Database) {
        // Admin rights are not enough; the guard forwards and nothing answers.
        let response = client.post(uri!(reset)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
