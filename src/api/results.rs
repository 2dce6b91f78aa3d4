use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{api::PostResults, mongodb::Id},
    results::ResultsAggregator,
};

pub fn routes() -> Vec<Route> {
    routes![post_results]
}

/// Current results for a post: per-candidate counts, total, turnout.
///
/// Served through the aggregator so dashboards polling here and subscribers
/// fed by the broadcaster see identical numbers for the same ledger state.
#[get("/posts/<post_id>/results")]
async fn post_results(
    post_id: Id,
    aggregator: &State<ResultsAggregator>,
) -> Result<Json<PostResults>> {
    Ok(Json(aggregator.post_results(post_id).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::{bson::doc, Database};
    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::{
        common::VoteStatus,
        db::{candidate::Candidate, post::Post, vote::Vote, voter::NewVoter},
        mongodb::Coll,
    };
    use crate::{config::Config, receipt};

    use super::*;

    async fn seed(db: &Database, config: &Config) -> (Post, Vec<Candidate>, Vec<Vote>) {
        let post = Post::open_example();
        Coll::<Post>::from_db(db)
            .insert_one(&post, None)
            .await
            .unwrap();
        let candidates = vec![
            Candidate::example_for(post.id, "Alice"),
            Candidate::example_for(post.id, "Bob"),
            Candidate::example_for(post.id, "Carol"),
        ];
        Coll::<Candidate>::from_db(db)
            .insert_many(&candidates, None)
            .await
            .unwrap();

        // Four voters so turnout maths are non-trivial.
        let voters: Vec<NewVoter> = (1..=4)
            .map(|n| NewVoter::new(format!("S{n:03}"), "x".to_string()))
            .collect();
        Coll::<NewVoter>::from_db(db)
            .insert_many(&voters, None)
            .await
            .unwrap();

        // Alice 2, Bob 1, Carol 0.
        let mut votes = vec![
            Vote::new(Id::new(), post.id, candidates[0].id, Utc::now()),
            Vote::new(Id::new(), post.id, candidates[0].id, Utc::now()),
            Vote::new(Id::new(), post.id, candidates[1].id, Utc::now()),
        ];
        for vote in &mut votes {
            vote.receipt_hash = receipt::compute_receipt(vote, config);
        }
        Coll::<Vote>::from_db(db)
            .insert_many(&votes, None)
            .await
            .unwrap();

        (post, candidates, votes)
    }

    #[backend_test]
    async fn counts_sum_and_zero_fill(client: Client, db: Database) {
        let config = client.rocket().state::<Config>().unwrap();
        let (post, candidates, _votes) = seed(&db, config).await;

        let response = client
            .get(format!("/posts/{}/results", post.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: PostResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        assert_eq!(results.tallies[&candidates[0].id], 2);
        assert_eq!(results.tallies[&candidates[1].id], 1);
        // Candidates without votes still appear.
        assert_eq!(results.tallies[&candidates[2].id], 0);
        assert_eq!(
            results.tallies.values().sum::<u64>(),
            results.total_votes
        );
        assert_eq!(results.total_votes, 3);
        // 3 counted votes, 4 eligible voters.
        assert!((results.turnout_percentage - 75.0).abs() < f64::EPSILON);
    }

    #[backend_test]
    async fn invalidated_votes_are_excluded(client: Client, db: Database) {
        let config = client.rocket().state::<Config>().unwrap();
        let (post, candidates, votes) = seed(&db, config).await;

        Coll::<Vote>::from_db(&db)
            .update_one(
                votes[0].id.as_doc(),
                doc! { "$set": { "status": VoteStatus::Invalidated } },
                None,
            )
            .await
            .unwrap();

        let response = client
            .get(format!("/posts/{}/results", post.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: PostResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        assert_eq!(results.tallies[&candidates[0].id], 1);
        assert_eq!(results.total_votes, 2);
    }

    #[backend_test]
    async fn unknown_post_is_not_found(client: Client, _db: Database) {
        let response = client
            .get(format!("/posts/{}/results", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
