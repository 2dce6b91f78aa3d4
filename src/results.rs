//! On-demand aggregation of per-post results.
//!
//! Counts are always derived from the votes collection; the per-process cache
//! is write-through (overwritten by a fresh recount on every mutation) and can
//! be dropped at any time without losing information. Pull (dashboard query)
//! and push (broadcast after a commit) therefore observe identical results for
//! the same ledger state.

use std::collections::HashMap;
use std::sync::Arc;

use mongodb::{
    bson::{doc, Bson},
    Database,
};
use rocket::{
    futures::TryStreamExt,
    tokio::sync::RwLock,
};

use crate::error::{Error, Result};
use crate::model::{
    api::PostResults,
    common::VoteStatus,
    db::{candidate::Candidate, post::Post, vote::Vote, voter::Voter},
    mongodb::{Coll, Id},
};

/// Shared handle on the aggregator; cheap to clone.
#[derive(Clone)]
pub struct ResultsAggregator {
    db: Database,
    cache: Arc<RwLock<HashMap<Id, PostResults>>>,
}

impl ResultsAggregator {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the results for a post, serving from cache when available.
    pub async fn post_results(&self, post_id: Id) -> Result<PostResults> {
        if let Some(results) = self.cache.read().await.get(&post_id) {
            return Ok(results.clone());
        }
        self.refresh(post_id).await
    }

    /// Recount from the ledger and overwrite the cached entry.
    /// Called after every mutation that can change the counts.
    pub async fn refresh(&self, post_id: Id) -> Result<PostResults> {
        let results = self.recount(post_id).await?;
        self.cache.write().await.insert(post_id, results.clone());
        Ok(results)
    }

    /// Forget everything cached; the next query recounts from the ledger.
    /// Used after restore and reset, when any number of posts may have changed.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Full recount of non-invalidated votes for the post.
    async fn recount(&self, post_id: Id) -> Result<PostResults> {
        let posts = Coll::<Post>::from_db(&self.db);
        posts
            .find_one(post_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Post {post_id}")))?;

        // Count votes grouped by candidate, excluding invalidated ones.
        let votes = Coll::<Vote>::from_db(&self.db);
        let pipeline = vec![
            doc! {
                "$match": {
                    "post_id": post_id,
                    "status": { "$ne": VoteStatus::Invalidated },
                }
            },
            doc! {
                "$group": {
                    "_id": "$candidate_id",
                    "count": { "$sum": 1 },
                }
            },
        ];
        let mut tallies = HashMap::new();
        let mut groups = votes.aggregate(pipeline, None).await?;
        while let Some(group) = groups.try_next().await? {
            let candidate_id: Id = group
                .get_object_id("_id")
                .map_err(|_| Error::Integrity("malformed aggregation group".to_string()))?
                .into();
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            tallies.insert(candidate_id, count);
        }

        // Candidates without votes still appear, with a zero count.
        let candidates = Coll::<Candidate>::from_db(&self.db);
        let post_candidates: Vec<Candidate> = candidates
            .find(doc! { "post_id": post_id }, None)
            .await?
            .try_collect()
            .await?;
        for candidate in post_candidates {
            tallies.entry(candidate.id).or_insert(0);
        }

        let total_votes = tallies.values().sum();

        let voters = Coll::<Voter>::from_db(&self.db);
        let eligible_voters = voters.count_documents(None, None).await?;

        Ok(PostResults {
            tallies,
            total_votes,
            turnout_percentage: PostResults::turnout(total_votes, eligible_voters),
        })
    }
}
