use std::fmt::Display;
use std::future::Future;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession,
};
use rocket::futures::TryStreamExt;

use crate::model::{
    common::{CandidateId, CategoryId, ExternalId, PositionId, VoteStatus, VoterId},
    db::{Candidate, Category, NewVote, NewVoter, Position, Vote, Voter},
    mongodb::{
        ensure_counters_exist, ensure_indexes_exist, is_duplicate_key_error, Coll, Counter,
        MongoCollection,
    },
};

use super::{Ledger, LedgerError, Resolution};

/// How many times a settlement transaction, or its commit, is attempted
/// before a transient failure is reported.
const SETTLE_ATTEMPTS: usize = 3;

/// A ledger backed by a MongoDB database.
///
/// IDs are allocated from the `counters` collection. Settling a pending vote
/// runs in a multi-document transaction, so the server must be a replica set.
#[derive(Clone)]
pub struct MongoLedger {
    client: Client,
    categories: Coll<Category>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
    counters: Coll<Counter>,
}

impl MongoLedger {
    /// Connect to the given database, creating indexes and ID counters if missing.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, LedgerError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);

        ensure_indexes_exist(&db).await?;
        let counters = Coll::<Counter>::from_db(&db);
        ensure_counters_exist(&counters).await?;

        Ok(Self {
            categories: Coll::from_db(&db),
            positions: Coll::from_db(&db),
            candidates: Coll::from_db(&db),
            voters: Coll::from_db(&db),
            votes: Coll::from_db(&db),
            counters,
            client,
        })
    }

    async fn next_id<T: MongoCollection>(&self) -> Result<u32, LedgerError> {
        Counter::next(&self.counters, T::NAME).await
    }

    async fn settle_in_session(
        &self,
        session: &mut ClientSession,
        filter: Document,
        resolution: Resolution,
    ) -> Result<Option<Vote>, DbError> {
        session.start_transaction(None).await?;
        let settled = match resolution {
            Resolution::Delete => {
                self.votes
                    .find_one_and_delete_with_session(filter, None, session)
                    .await?
            }
            Resolution::Complete | Resolution::Fail => {
                let status = if resolution == Resolution::Complete {
                    VoteStatus::Completed
                } else {
                    VoteStatus::Failed
                };
                let options = FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::Before)
                    .build();
                self.votes
                    .find_one_and_update_with_session(
                        filter,
                        doc! { "$set": { "status": status } },
                        options,
                        session,
                    )
                    .await?
            }
        };
        let mut attempt = 1;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(settled),
                Err(e)
                    if attempt < SETTLE_ATTEMPTS
                        && e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) =>
                {
                    warn!("Commit outcome unknown (attempt {attempt}), committing again: {e}");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run `op` until it succeeds, fails with an error `transient` rejects, or
/// has been tried `attempts` times. The last error is returned as is.
async fn retry_while<T, E, F, Fut>(
    attempts: usize,
    transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < attempts && transient(&e) => {
                warn!("Transient failure (attempt {attempt}), retrying: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn by_id(id: u32) -> Document {
    doc! { "_id": id }
}

fn ascending_ids() -> FindOptions {
    FindOptions::builder().sort(doc! { "_id": 1 }).build()
}

#[rocket::async_trait]
impl Ledger for MongoLedger {
    async fn insert_category(&self, name: String) -> Result<Category, LedgerError> {
        let category = Category {
            id: self.next_id::<Category>().await?,
            name,
        };
        self.categories.insert_one(&category, None).await?;
        Ok(category)
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, LedgerError> {
        Ok(self.categories.find_one(by_id(id), None).await?)
    }

    async fn categories(&self) -> Result<Vec<Category>, LedgerError> {
        let cursor = self.categories.find(None, ascending_ids()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, LedgerError> {
        let result = self.categories.delete_one(by_id(id), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_position(
        &self,
        name: String,
        category_id: CategoryId,
    ) -> Result<Position, LedgerError> {
        let position = Position {
            id: self.next_id::<Position>().await?,
            name,
            category_id,
        };
        self.positions.insert_one(&position, None).await?;
        Ok(position)
    }

    async fn position(&self, id: PositionId) -> Result<Option<Position>, LedgerError> {
        Ok(self.positions.find_one(by_id(id), None).await?)
    }

    async fn positions(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Position>, LedgerError> {
        let filter = category_id.map(|id| doc! { "category_id": id });
        let cursor = self.positions.find(filter, ascending_ids()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_candidate(
        &self,
        name: String,
        position_id: PositionId,
    ) -> Result<Candidate, LedgerError> {
        let candidate = Candidate {
            id: self.next_id::<Candidate>().await?,
            name,
            position_id,
        };
        self.candidates.insert_one(&candidate, None).await?;
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, LedgerError> {
        Ok(self.candidates.find_one(by_id(id), None).await?)
    }

    async fn candidates(
        &self,
        position_id: Option<PositionId>,
    ) -> Result<Vec<Candidate>, LedgerError> {
        let filter = position_id.map(|id| doc! { "position_id": id });
        let cursor = self.candidates.find(filter, ascending_ids()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter, LedgerError> {
        let voter = voter.with_id(self.next_id::<Voter>().await?);
        self.voters.insert_one(&voter, None).await?;
        Ok(voter)
    }

    async fn voters_by_name_or_phone(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Vec<Voter>, LedgerError> {
        let filter = doc! { "$or": [{ "name": name }, { "phone": phone }] };
        let cursor = self.voters.find(filter, ascending_ids()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn voters(&self, ids: &[VoterId]) -> Result<Vec<Voter>, LedgerError> {
        let ids = ids.iter().copied().map(Bson::from).collect::<Vec<_>>();
        let cursor = self.voters.find(doc! { "_id": { "$in": ids } }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, LedgerError> {
        let vote = vote.pending(self.next_id::<Vote>().await?, Utc::now());
        match self.votes.insert_one(&vote, None).await {
            Ok(_) => Ok(vote),
            Err(e) if is_duplicate_key_error(&e) => {
                Err(LedgerError::DuplicateExternalId(vote.external_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn vote(&self, external_id: &ExternalId) -> Result<Option<Vote>, LedgerError> {
        let filter = doc! { "external_id": external_id };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn settle_pending(
        &self,
        external_id: &ExternalId,
        resolution: Resolution,
    ) -> Result<Option<Vote>, LedgerError> {
        let filter = doc! {
            "external_id": external_id,
            "status": VoteStatus::Pending,
        };
        // A write conflict with a concurrent settlement, a failover or a dropped
        // connection all abort the transaction. Each retry starts afresh, so the
        // loser of a conflict re-reads and finds no pending vote.
        let settled = retry_while(
            SETTLE_ATTEMPTS,
            |e: &DbError| e.contains_label(TRANSIENT_TRANSACTION_ERROR),
            || {
                let filter = filter.clone();
                async move {
                    // Dropping the session without committing aborts the transaction.
                    let mut session = self.client.start_session(None).await?;
                    self.settle_in_session(&mut session, filter, resolution)
                        .await
                }
            },
        )
        .await;
        settled.map_err(|e| {
            warn!("Could not settle vote {external_id}: {e}");
            e.into()
        })
    }

    async fn set_vote_amount(
        &self,
        external_id: &ExternalId,
        amount: u32,
    ) -> Result<bool, LedgerError> {
        let result = self
            .votes
            .update_one(
                doc! { "external_id": external_id },
                doc! { "$set": { "amount": amount } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn completed_votes(
        &self,
        candidates: Option<&[CandidateId]>,
    ) -> Result<Vec<Vote>, LedgerError> {
        let mut filter = doc! { "status": VoteStatus::Completed };
        if let Some(ids) = candidates {
            let ids = ids.iter().copied().map(Bson::from).collect::<Vec<_>>();
            filter.insert("candidate_id", doc! { "$in": ids });
        }
        let cursor = self.votes.find(filter, ascending_ids()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn pending_votes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Vote>, LedgerError> {
        debug!("Querying pending votes created before {cutoff}");
        let filter = doc! {
            "status": VoteStatus::Pending,
            "created_at": { "$lt": BsonDateTime::from_chrono(cutoff) },
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let cursor = self.votes.find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mongodb::Database;

    use super::*;
    use crate::model::mongodb::testing::{scratch_database, scratch_database_name, test_db_uri};

    #[rocket::async_test]
    async fn retries_transient_failures_up_to_the_limit() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = retry_while(
            SETTLE_ATTEMPTS,
            |e: &String| e == "transient",
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Exhausted retries surface the error rather than a result.
        calls.store(0, Ordering::SeqCst);
        let result: Result<u32, String> = retry_while(
            SETTLE_ATTEMPTS,
            |e: &String| e == "transient",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("transient".to_string()) }
            },
        )
        .await;
        assert_eq!(result, Err("transient".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), SETTLE_ATTEMPTS);
    }

    #[rocket::async_test]
    async fn other_failures_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = retry_while(
            SETTLE_ATTEMPTS,
            |e: &String| e == "transient",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;
        assert_eq!(result, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    async fn scratch_ledger() -> (MongoLedger, Database) {
        let name = scratch_database_name();
        let ledger = MongoLedger::connect(&test_db_uri(), &name).await.unwrap();
        (ledger, scratch_database(&name).await)
    }

    /// A candidate and a voter to hang votes off.
    async fn seed(ledger: &MongoLedger) -> (Candidate, Candidate, Voter) {
        let category = ledger.insert_category("Best Artist".to_string()).await.unwrap();
        let position = ledger
            .insert_position("Female Vocalist".to_string(), category.id)
            .await
            .unwrap();
        let first = ledger
            .insert_candidate("Wanjiru".to_string(), position.id)
            .await
            .unwrap();
        let second = ledger
            .insert_candidate("Achieng".to_string(), position.id)
            .await
            .unwrap();
        let voter = ledger
            .insert_voter(NewVoter {
                name: "Otieno".to_string(),
                phone: "254712345678".to_string(),
            })
            .await
            .unwrap();
        (first, second, voter)
    }

    fn new_vote(voter: &Voter, candidate: &Candidate, external_id: &str) -> NewVote {
        NewVote {
            voter_id: voter.id,
            candidate_id: candidate.id,
            external_id: external_id.into(),
            amount: 10,
        }
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn ids_start_at_one_per_collection() {
        let (ledger, db) = scratch_ledger().await;
        let (first, second, voter) = seed(&ledger).await;
        assert_eq!((first.id, second.id, voter.id), (1, 2, 1));
        assert_eq!(ledger.categories().await.unwrap()[0].id, 1);
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn pending_vote_settles_once() {
        let (ledger, db) = scratch_ledger().await;
        let (candidate, _, voter) = seed(&ledger).await;
        let vote = ledger
            .insert_vote(new_vote(&voter, &candidate, "TX_1"))
            .await
            .unwrap();

        let settled = ledger
            .settle_pending(&vote.external_id, Resolution::Complete)
            .await
            .unwrap();
        let settled = settled.unwrap();
        assert_eq!((settled.id, settled.status), (vote.id, VoteStatus::Pending));
        let stored = ledger.vote(&vote.external_id).await.unwrap().unwrap();
        assert_eq!(stored.status, VoteStatus::Completed);

        let replay = ledger
            .settle_pending(&vote.external_id, Resolution::Delete)
            .await
            .unwrap();
        assert!(replay.is_none());
        assert!(ledger.vote(&vote.external_id).await.unwrap().is_some());
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn rejected_vote_is_deleted_or_failed() {
        let (ledger, db) = scratch_ledger().await;
        let (candidate, _, voter) = seed(&ledger).await;
        for id in ["TX_1", "TX_2"] {
            ledger.insert_vote(new_vote(&voter, &candidate, id)).await.unwrap();
        }

        ledger
            .settle_pending(&"TX_1".into(), Resolution::Delete)
            .await
            .unwrap()
            .unwrap();
        assert!(ledger.vote(&"TX_1".into()).await.unwrap().is_none());

        ledger
            .settle_pending(&"TX_2".into(), Resolution::Fail)
            .await
            .unwrap()
            .unwrap();
        let failed = ledger.vote(&"TX_2".into()).await.unwrap().unwrap();
        assert_eq!(failed.status, VoteStatus::Failed);
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn concurrent_settlements_transition_once() {
        let (ledger, db) = scratch_ledger().await;
        let (candidate, _, voter) = seed(&ledger).await;
        let vote = ledger
            .insert_vote(new_vote(&voter, &candidate, "TX_1"))
            .await
            .unwrap();

        let (a, b) = rocket::futures::join!(
            ledger.settle_pending(&vote.external_id, Resolution::Complete),
            ledger.settle_pending(&vote.external_id, Resolution::Delete),
        );
        let winners = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn duplicate_external_id_is_rejected() {
        let (ledger, db) = scratch_ledger().await;
        let (candidate, _, voter) = seed(&ledger).await;
        ledger
            .insert_vote(new_vote(&voter, &candidate, "TX_1"))
            .await
            .unwrap();
        let duplicate = ledger.insert_vote(new_vote(&voter, &candidate, "TX_1")).await;
        assert!(
            matches!(duplicate, Err(LedgerError::DuplicateExternalId(id)) if id.as_str() == "TX_1")
        );
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn completed_votes_are_filtered_by_candidate() {
        let (ledger, db) = scratch_ledger().await;
        let (first, second, voter) = seed(&ledger).await;
        for (candidate, id) in [(&first, "TX_1"), (&second, "TX_2"), (&second, "TX_3")] {
            ledger.insert_vote(new_vote(&voter, candidate, id)).await.unwrap();
        }
        for id in ["TX_1", "TX_2"] {
            ledger
                .settle_pending(&id.into(), Resolution::Complete)
                .await
                .unwrap()
                .unwrap();
        }

        let all = ledger.completed_votes(None).await.unwrap();
        let ids = all.iter().map(|v| v.external_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["TX_1", "TX_2"]);

        let second_only = ledger.completed_votes(Some(&[second.id])).await.unwrap();
        assert_eq!(second_only.len(), 1);
        assert_eq!(second_only[0].external_id.as_str(), "TX_2");

        assert!(ledger.completed_votes(Some(&[])).await.unwrap().is_empty());
        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn voters_are_found_by_id_and_by_name_or_phone() {
        let (ledger, db) = scratch_ledger().await;
        let (_, _, voter) = seed(&ledger).await;
        let other = ledger
            .insert_voter(NewVoter {
                name: "Kamau".to_string(),
                phone: "254700000001".to_string(),
            })
            .await
            .unwrap();

        let mut found = ledger.voters(&[other.id, voter.id, 99]).await.unwrap();
        found.sort_by_key(|v| v.id);
        assert_eq!(found, [voter.clone(), other.clone()]);

        let by_phone = ledger
            .voters_by_name_or_phone("Someone", "254700000001")
            .await
            .unwrap();
        assert_eq!(by_phone, [other]);
        let by_name = ledger
            .voters_by_name_or_phone("Otieno", "254799999999")
            .await
            .unwrap();
        assert_eq!(by_name, [voter]);
        db.drop(None).await.unwrap();
    }
}
