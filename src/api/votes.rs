use mongodb::{bson::doc, Client};
use rocket::{response::status::Created, serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    audit::AuditRecorder,
    broadcast::Broadcaster,
    config::Config,
    error::{Error, Result},
    model::{
        api::{CastReceipt, CastRequest, ReceiptCheck},
        auth::AuthToken,
        common::VoteStatus,
        db::{
            admin::Admin, audit::AuditAction, candidate::Candidate, post::Post, vote::Vote,
            voter::Voter,
        },
        mongodb::{Coll, Id},
    },
    receipt,
    results::ResultsAggregator,
    voting,
};

use super::common::admin_by_token;

pub fn routes() -> Vec<Route> {
    routes![cast, verify_receipt, verify_vote, invalidate_vote]
}

#[post("/votes", data = "<request>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast(
    token: AuthToken<Voter>,
    request: Json<CastRequest>,
    db_client: &State<Client>,
    posts: Coll<Post>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
    config: &State<Config>,
    broadcaster: &State<Broadcaster>,
    aggregator: &State<ResultsAggregator>,
) -> Result<Created<Json<CastReceipt>>> {
    let vote = voting::cast_vote(
        token.id,
        &request,
        db_client,
        &posts,
        &candidates,
        &votes,
        &voters,
        config,
    )
    .await?;

    // Fanout is asynchronous and best-effort; the vote is already durable.
    voting::broadcast_commit(&vote, broadcaster.inner().clone(), aggregator.inner().clone());

    let receipt = CastReceipt::from(vote);
    let location = format!("/votes/verify/{}", receipt.receipt_hash);
    Ok(Created::new(location).body(Json(receipt)))
}

/// Public proof-of-inclusion lookup. Returns the post and timestamp only:
/// enough to prove the vote exists, nothing that links it to a voter or
/// reveals the candidate.
#[get("/votes/verify/<hash>")]
async fn verify_receipt(hash: &str, votes: Coll<Vote>) -> Result<Json<ReceiptCheck>> {
    let vote = votes
        .find_one(doc! { "receipt_hash": hash }, None)
        .await?
        .ok_or_else(|| Error::not_found("Receipt"))?;
    Ok(Json(ReceiptCheck::from(&vote)))
}

#[post("/votes/<vote_id>/verify")]
async fn verify_vote(
    token: AuthToken<Admin>,
    vote_id: Id,
    votes: Coll<Vote>,
    admins: Coll<Admin>,
    config: &State<Config>,
    audit: &State<AuditRecorder>,
) -> Result<()> {
    let admin = admin_by_token(&token, &admins).await?;

    let vote = votes
        .find_one(vote_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote {vote_id}")))?;
    if vote.status == VoteStatus::Invalidated {
        return Err(Error::validation(
            "vote_id",
            "An invalidated vote cannot be verified",
        ));
    }

    // Tamper evidence: the stored receipt must match a recomputation over the
    // stored fields before we certify the vote.
    if !receipt::receipt_matches(&vote, config) {
        return Err(Error::Integrity(format!(
            "Receipt hash of vote {vote_id} does not match its contents"
        )));
    }

    let update = doc! { "$set": { "status": VoteStatus::Verified } };
    votes.update_one(vote_id.as_doc(), update, None).await?;

    audit.record(
        admin.username.clone(),
        AuditAction::VoteVerified,
        vote_id.to_string(),
        format!("status {:?} -> Verified", vote.status),
    );
    Ok(())
}

/// The reason an admin gives when invalidating a vote.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct InvalidateRequest {
    pub reason: String,
}

#[post("/votes/<vote_id>/invalidate", data = "<request>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn invalidate_vote(
    token: AuthToken<Admin>,
    vote_id: Id,
    request: Json<InvalidateRequest>,
    votes: Coll<Vote>,
    admins: Coll<Admin>,
    audit: &State<AuditRecorder>,
    broadcaster: &State<Broadcaster>,
    aggregator: &State<ResultsAggregator>,
) -> Result<()> {
    let admin = admin_by_token(&token, &admins).await?;

    let vote = votes
        .find_one(vote_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote {vote_id}")))?;
    if vote.status == VoteStatus::Invalidated {
        return Err(Error::validation("vote_id", "Vote is already invalidated"));
    }

    // The vote stays in the ledger (and keeps its slot: the voter does not
    // get another attempt); it is only excluded from the tallies.
    let update = doc! {
        "$set": {
            "status": VoteStatus::Invalidated,
            "invalidation_reason": &request.reason,
        }
    };
    votes.update_one(vote_id.as_doc(), update, None).await?;

    audit.record(
        admin.username.clone(),
        AuditAction::VoteInvalidated,
        vote_id.to_string(),
        format!("status {:?} -> Invalidated; reason: {}", vote.status, request.reason),
    );

    // Counts changed: push fresh snapshots to live dashboards.
    match aggregator.refresh(vote.post_id).await {
        Ok(results) => {
            broadcaster.results_changed(vote.post_id, &results);
            broadcaster.notify_admins(format!("Vote {vote_id} invalidated: {}", request.reason));
        }
        Err(err) => warn!("Fanout skipped after invalidating vote {vote_id}: {err}"),
    }

    Ok(())
}
