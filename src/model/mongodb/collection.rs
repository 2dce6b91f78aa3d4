use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    audit::{AuditLogEntry, NewAuditLogEntry},
    backup::{BackupSnapshot, NewBackupSnapshot},
    candidate::Candidate,
    post::Post,
    vote::{NewVote, Vote},
    voter::{NewVoter, Voter},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Voter collections
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Post and candidate collections
const POSTS: &str = "posts";
impl MongoCollection for Post {
    const NAME: &'static str = POSTS;
}
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collection
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Audit log collection
const AUDIT_LOG: &str = "audit_log";
impl MongoCollection for AuditLogEntry {
    const NAME: &'static str = AUDIT_LOG;
}
impl MongoCollection for NewAuditLogEntry {
    const NAME: &'static str = AUDIT_LOG;
}

// Backup snapshot collection
const BACKUPS: &str = "backups";
impl MongoCollection for BackupSnapshot {
    const NAME: &'static str = BACKUPS;
}
impl MongoCollection for NewBackupSnapshot {
    const NAME: &'static str = BACKUPS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// The `(voter_id, post_id)` unique index on votes is the arbiter of the
/// one-vote-per-post invariant: concurrent casts for the same slot are
/// serialised here, and exactly one insert wins. The index spans invalidated
/// votes too, so invalidation never frees the slot.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Vote collection: one vote per (voter, post), ever.
    let vote_slot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "post_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_slot_index, None)
        .await?;

    // Vote collection: receipts are looked up by hash and must not collide.
    let receipt_index = IndexModel::builder()
        .keys(doc! {"receipt_hash": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(receipt_index, None)
        .await?;

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Candidate collection: lookups during casting are by (candidate, post).
    let candidate_index = IndexModel::builder()
        .keys(doc! {"post_id": 1, "_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    Ok(())
}
