use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;
use crate::model::db::{Candidate, Category, Position, Vote, Voter};

use super::{Coll, MongoCollection};

/// A counter object used to implement auto-increment fields.
///
/// There is one counter per entity collection, keyed by the collection name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32, LedgerError> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| LedgerError::MissingCounter(id.to_string()))?;
        Ok(counter.next)
    }
}

/// Create a counter starting at 1 for every entity collection, leaving
/// existing counters untouched.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<(), LedgerError> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [
        Category::NAME,
        Position::NAME,
        Candidate::NAME,
        Voter::NAME,
        Vote::NAME,
    ] {
        counters
            .update_one(
                doc! { "_id": id },
                doc! { "$setOnInsert": { "next": 1 } },
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mongodb::testing::{scratch_database, scratch_database_name};

    #[rocket::async_test]
    #[ignore = "needs a MongoDB server"]
    async fn counters_start_at_one_and_increment() {
        let db = scratch_database(&scratch_database_name()).await;
        let counters = Coll::<Counter>::from_db(&db);
        ensure_counters_exist(&counters).await.unwrap();

        assert_eq!(Counter::next(&counters, Vote::NAME).await.unwrap(), 1);
        assert_eq!(Counter::next(&counters, Vote::NAME).await.unwrap(), 2);
        assert_eq!(Counter::next(&counters, Voter::NAME).await.unwrap(), 1);

        // Existing counters survive a second start-up.
        ensure_counters_exist(&counters).await.unwrap();
        assert_eq!(Counter::next(&counters, Vote::NAME).await.unwrap(), 3);

        let missing = Counter::next(&counters, "ballots").await;
        assert!(matches!(missing, Err(LedgerError::MissingCounter(id)) if id == "ballots"));

        db.drop(None).await.unwrap();
    }
}
