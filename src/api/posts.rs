use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        db::{candidate::Candidate, post::Post},
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_posts, get_post, get_post_candidates]
}

/// Read-only listing of all election posts, for dashboards.
#[get("/posts")]
async fn get_posts(posts: Coll<Post>) -> Result<Json<Vec<Post>>> {
    let all: Vec<Post> = posts.find(None, None).await?.try_collect().await?;
    Ok(Json(all))
}

#[get("/posts/<post_id>")]
async fn get_post(post_id: Id, posts: Coll<Post>) -> Result<Json<Post>> {
    let post = posts
        .find_one(post_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {post_id}")))?;
    Ok(Json(post))
}

#[get("/posts/<post_id>/candidates")]
async fn get_post_candidates(post_id: Id, candidates: Coll<Candidate>) -> Result<Json<Vec<Candidate>>> {
    let list: Vec<Candidate> = candidates
        .find(doc! { "post_id": post_id }, None)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list))
}
