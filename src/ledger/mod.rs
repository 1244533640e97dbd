//! The ledger: durable storage for the ballot hierarchy, voters and votes.
//!
//! Services never talk to a database directly; they are handed a
//! [`LedgerHandle`] so the storage backend can be swapped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    common::{CandidateId, CategoryId, ExternalId, PositionId, VoterId},
    db::{Candidate, Category, NewVote, NewVoter, Position, Vote, Voter},
};

mod memory;
pub use memory::MemoryLedger;

mod mongo;
pub use mongo::MongoLedger;

/// A shared, type-erased ledger, as kept in Rocket's managed state.
pub type LedgerHandle = Arc<dyn Ledger>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Db(#[from] mongodb::error::Error),
    #[error("A vote with external ID '{0}' already exists")]
    DuplicateExternalId(ExternalId),
    #[error("ID counter '{0}' is missing")]
    MissingCounter(String),
}

/// The terminal transition applied to a pending vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Payment confirmed: the vote now counts.
    Complete,
    /// Payment rejected, keep the row as `failed`.
    Fail,
    /// Payment rejected, remove the row.
    Delete,
}

#[rocket::async_trait]
pub trait Ledger: Send + Sync {
    async fn insert_category(&self, name: String) -> Result<Category, LedgerError>;
    async fn category(&self, id: CategoryId) -> Result<Option<Category>, LedgerError>;
    /// All categories, by ascending ID.
    async fn categories(&self) -> Result<Vec<Category>, LedgerError>;
    /// Returns whether the category existed. Its positions are left in place.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, LedgerError>;

    async fn insert_position(
        &self,
        name: String,
        category_id: CategoryId,
    ) -> Result<Position, LedgerError>;
    async fn position(&self, id: PositionId) -> Result<Option<Position>, LedgerError>;
    /// Positions by ascending ID, optionally only those of one category.
    async fn positions(&self, category_id: Option<CategoryId>)
        -> Result<Vec<Position>, LedgerError>;

    async fn insert_candidate(
        &self,
        name: String,
        position_id: PositionId,
    ) -> Result<Candidate, LedgerError>;
    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, LedgerError>;
    /// Candidates by ascending ID, optionally only those of one position.
    async fn candidates(
        &self,
        position_id: Option<PositionId>,
    ) -> Result<Vec<Candidate>, LedgerError>;

    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter, LedgerError>;
    /// Voters whose name or phone equals the given one, by ascending ID.
    async fn voters_by_name_or_phone(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Vec<Voter>, LedgerError>;
    /// The voters with the given IDs, in no particular order. Unknown IDs are skipped.
    async fn voters(&self, ids: &[VoterId]) -> Result<Vec<Voter>, LedgerError>;

    /// Record a new pending vote, stamped with the current time.
    ///
    /// Fails with [`LedgerError::DuplicateExternalId`] if the external ID is taken.
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, LedgerError>;
    async fn vote(&self, external_id: &ExternalId) -> Result<Option<Vote>, LedgerError>;

    /// Atomically apply a terminal transition to the pending vote with the
    /// given external ID, returning the vote as it was while pending.
    ///
    /// Returns `None` without mutating anything if there is no such pending
    /// vote, including when a concurrent settlement of the same vote won.
    async fn settle_pending(
        &self,
        external_id: &ExternalId,
        resolution: Resolution,
    ) -> Result<Option<Vote>, LedgerError>;

    /// Overwrite the amount of the vote with the given external ID.
    /// Returns whether such a vote exists.
    async fn set_vote_amount(
        &self,
        external_id: &ExternalId,
        amount: u32,
    ) -> Result<bool, LedgerError>;

    /// Completed votes, optionally only those for the given candidates.
    async fn completed_votes(
        &self,
        candidates: Option<&[CandidateId]>,
    ) -> Result<Vec<Vote>, LedgerError>;

    /// Pending votes created strictly before `cutoff`, oldest first.
    async fn pending_votes_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Vote>, LedgerError>;
}
