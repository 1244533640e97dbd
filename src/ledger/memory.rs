use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::model::{
    common::{CandidateId, CategoryId, ExternalId, PositionId, VoteStatus, VoterId},
    db::{Candidate, Category, NewVote, NewVoter, Position, Vote, Voter},
};

use super::{Ledger, LedgerError, Resolution};

/// A ledger held entirely in process memory.
///
/// Every operation holds the table lock for its whole duration, so each one
/// is atomic with respect to the others. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    categories: Table<Category>,
    positions: Table<Position>,
    candidates: Table<Candidate>,
    voters: Table<Voter>,
    votes: Table<Vote>,
}

/// Rows keyed by an auto-incremented ID starting at 1.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<u32, T>,
    next_id: u32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, row: impl FnOnce(u32) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = row(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: u32) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn select(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        self.rows
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Ledger for MemoryLedger {
    async fn insert_category(&self, name: String) -> Result<Category, LedgerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.categories.insert_with(|id| Category { id, name }))
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, LedgerError> {
        Ok(self.tables.lock().await.categories.get(id))
    }

    async fn categories(&self) -> Result<Vec<Category>, LedgerError> {
        Ok(self.tables.lock().await.categories.select(|_| true))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.categories.rows.remove(&id).is_some())
    }

    async fn insert_position(
        &self,
        name: String,
        category_id: CategoryId,
    ) -> Result<Position, LedgerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.positions.insert_with(|id| Position {
            id,
            name,
            category_id,
        }))
    }

    async fn position(&self, id: PositionId) -> Result<Option<Position>, LedgerError> {
        Ok(self.tables.lock().await.positions.get(id))
    }

    async fn positions(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Position>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .positions
            .select(|p| category_id.map_or(true, |id| p.category_id == id)))
    }

    async fn insert_candidate(
        &self,
        name: String,
        position_id: PositionId,
    ) -> Result<Candidate, LedgerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.candidates.insert_with(|id| Candidate {
            id,
            name,
            position_id,
        }))
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, LedgerError> {
        Ok(self.tables.lock().await.candidates.get(id))
    }

    async fn candidates(
        &self,
        position_id: Option<PositionId>,
    ) -> Result<Vec<Candidate>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .select(|c| position_id.map_or(true, |id| c.position_id == id)))
    }

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter, LedgerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.voters.insert_with(|id| voter.with_id(id)))
    }

    async fn voters_by_name_or_phone(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Vec<Voter>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .voters
            .select(|v| v.name == name || v.phone == phone))
    }

    async fn voters(&self, ids: &[VoterId]) -> Result<Vec<Voter>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|&id| tables.voters.get(id)).collect())
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, LedgerError> {
        let mut tables = self.tables.lock().await;
        if tables
            .votes
            .rows
            .values()
            .any(|v| v.external_id == vote.external_id)
        {
            return Err(LedgerError::DuplicateExternalId(vote.external_id));
        }
        let now = Utc::now();
        Ok(tables.votes.insert_with(|id| vote.pending(id, now)))
    }

    async fn vote(&self, external_id: &ExternalId) -> Result<Option<Vote>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .rows
            .values()
            .find(|v| &v.external_id == external_id)
            .cloned())
    }

    async fn settle_pending(
        &self,
        external_id: &ExternalId,
        resolution: Resolution,
    ) -> Result<Option<Vote>, LedgerError> {
        let mut tables = self.tables.lock().await;
        let Some(id) = tables
            .votes
            .rows
            .values()
            .find(|v| &v.external_id == external_id && v.status == VoteStatus::Pending)
            .map(|v| v.id)
        else {
            return Ok(None);
        };
        let settled = match resolution {
            Resolution::Delete => tables.votes.rows.remove(&id),
            Resolution::Complete | Resolution::Fail => {
                tables.votes.rows.get_mut(&id).map(|vote| {
                    let pending = vote.clone();
                    vote.status = if resolution == Resolution::Complete {
                        VoteStatus::Completed
                    } else {
                        VoteStatus::Failed
                    };
                    pending
                })
            }
        };
        Ok(settled)
    }

    async fn set_vote_amount(
        &self,
        external_id: &ExternalId,
        amount: u32,
    ) -> Result<bool, LedgerError> {
        let mut tables = self.tables.lock().await;
        match tables
            .votes
            .rows
            .values_mut()
            .find(|v| &v.external_id == external_id)
        {
            Some(vote) => {
                vote.amount = amount;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn completed_votes(
        &self,
        candidates: Option<&[CandidateId]>,
    ) -> Result<Vec<Vote>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.votes.select(|v| {
            v.status == VoteStatus::Completed
                && candidates.map_or(true, |ids| ids.contains(&v.candidate_id))
        }))
    }

    async fn pending_votes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Vote>, LedgerError> {
        let tables = self.tables.lock().await;
        let mut votes = tables
            .votes
            .select(|v| v.status == VoteStatus::Pending && v.created_at < cutoff);
        votes.sort_by_key(|v| (v.created_at, v.id));
        Ok(votes)
    }
}
