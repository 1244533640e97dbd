use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Candidate, Category, Position, Vote, Voter};

use super::counter::Counter;

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

impl MongoCollection for Category {
    const NAME: &'static str = "categories";
}

impl MongoCollection for Position {
    const NAME: &'static str = "positions";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Vote collection: the external ID is the correlation key with the gateway.
    let external_id_index = IndexModel::builder()
        .keys(doc! {"external_id": 1})
        .options(unique)
        .build();
    let candidate_index = IndexModel::builder()
        .keys(doc! {"candidate_id": 1, "status": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([external_id_index, candidate_index], None)
        .await?;

    // Ballot hierarchy.
    let position_index = IndexModel::builder()
        .keys(doc! {"category_id": 1})
        .build();
    Coll::<Position>::from_db(db)
        .create_index(position_index, None)
        .await?;
    let candidate_index = IndexModel::builder()
        .keys(doc! {"position_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Voter lookups by the dedup policy.
    let name_index = IndexModel::builder().keys(doc! {"name": 1}).build();
    let phone_index = IndexModel::builder().keys(doc! {"phone": 1}).build();
    Coll::<Voter>::from_db(db)
        .create_indexes([name_index, phone_index], None)
        .await?;

    Ok(())
}
