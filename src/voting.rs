//! The vote casting service: validation, atomic commit, receipt, fanout.
//!
//! The uniqueness check and the insert execute as one atomic unit. A
//! check-then-insert alone would be racy under concurrent requests from the
//! same voter (two tabs submitting at once), so the unique `(voter_id,
//! post_id)` index is the final arbiter: of N racing casts exactly one
//! commits and the rest observe `DuplicateVote`. No guarantee is made about
//! which one wins.

use chrono::Utc;
use mongodb::{bson::doc, bson::to_bson, Client};
use rocket::tokio;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::CastRequest,
    db::{candidate::Candidate, post::Post, vote::Vote, voter::Voter},
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::receipt;
use crate::results::ResultsAggregator;

/// Cast a vote on behalf of `voter_id`.
///
/// Preconditions are checked in order, each with its own failure kind:
/// the post must exist and be open, the candidate must exist, belong to the
/// post and be active, and the voter must not have used this slot before.
/// On success the committed vote (receipt included) is returned; the voter's
/// denormalised summary is updated in the same transaction as the insert.
pub async fn cast_vote(
    voter_id: Id,
    request: &CastRequest,
    db_client: &Client,
    posts: &Coll<Post>,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
    voters: &Coll<Voter>,
    config: &Config,
) -> Result<Vote> {
    // The post must exist...
    let post = posts
        .find_one(request.post_id.as_doc(), None)
        .await?
        .ok_or_else(|| {
            Error::validation("post_id", format!("No post with ID {}", request.post_id))
        })?;

    // ...and be accepting votes right now.
    if !post.is_open(Utc::now()) {
        return Err(Error::forbidden(format!(
            "Post '{}' is not open for voting",
            post.title
        )));
    }

    // The candidate must exist, belong to the post, and be active.
    let candidate = candidates
        .find_one(
            doc! { "_id": request.candidate_id, "post_id": request.post_id },
            None,
        )
        .await?
        .ok_or_else(|| {
            Error::validation(
                "candidate_id",
                format!(
                    "No candidate with ID {} for post '{}'",
                    request.candidate_id, post.title
                ),
            )
        })?;
    if !candidate.active {
        return Err(Error::validation(
            "candidate_id",
            format!("Candidate '{}' is not active", candidate.name),
        ));
    }

    // Friendly fast path for the common double-submit; the unique index
    // below still decides the race.
    let slot_filter = doc! { "voter_id": voter_id, "post_id": request.post_id };
    if votes.find_one(slot_filter, None).await?.is_some() {
        return Err(Error::DuplicateVote(format!(
            "Voter has already cast a vote for post '{}'",
            post.title
        )));
    }

    let mut vote = Vote::new(voter_id, request.post_id, request.candidate_id, Utc::now());
    vote.receipt_hash = receipt::compute_receipt(&vote, config);

    // Atomic unit: the vote insert and the voter summary update commit
    // together or not at all. A duplicate key from the slot index surfaces
    // here and becomes `DuplicateVote`, never a raw storage error.
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let summary_field = format!("voted.{}", vote.post_id);
    let summary_update = doc! {
        "$set": { &summary_field: to_bson(&vote.cast_at).map_err(mongodb::error::Error::from)? }
    };
    let updated = voters
        .update_one_with_session(voter_id.as_doc(), summary_update, None, &mut session)
        .await?;
    if updated.matched_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found(format!("Voter {voter_id}")));
    }

    if let Err(err) = votes
        .insert_one_with_session(&vote, None, &mut session)
        .await
    {
        session.abort_transaction().await.ok();
        return Err(translate_slot_violation(err, &post));
    }
    if let Err(err) = session.commit_transaction().await {
        return Err(translate_slot_violation(err, &post));
    }

    Ok(vote)
}

/// Turn a duplicate-key write on the `(voter, post)` slot index into the
/// business-level `DuplicateVote`; everything else stays a storage error.
fn translate_slot_violation(err: mongodb::error::Error, post: &Post) -> Error {
    if is_duplicate_key_error(&err) {
        Error::DuplicateVote(format!(
            "Voter has already cast a vote for post '{}'",
            post.title
        ))
    } else {
        Error::Db(err)
    }
}

/// Kick off the post-commit fanout without extending the caller's wait.
///
/// Real-time delivery is best-effort: any failure here is logged and never
/// affects the already-durable vote.
pub fn broadcast_commit(vote: &Vote, broadcaster: Broadcaster, aggregator: ResultsAggregator) {
    let post_id = vote.post_id;
    let cast_at = vote.cast_at;
    tokio::spawn(async move {
        match aggregator.refresh(post_id).await {
            Ok(results) => {
                broadcaster.vote_committed(post_id, cast_at, &results);
            }
            Err(err) => {
                warn!("Post-commit fanout skipped for post {post_id}: {err}");
            }
        }
    });
}
