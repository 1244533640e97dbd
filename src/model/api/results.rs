use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, CategoryId, PositionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub id: CategoryId,
    pub name: String,
    pub positions: Vec<PositionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResult {
    pub id: PositionId,
    pub name: String,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: CandidateId,
    pub name: String,
    /// Votes bought across the whole position.
    pub all_vote_count: u64,
    pub vote_count: u64,
    /// Truncated to a whole percentage.
    pub vote_percentage: u64,
    pub voters_count: u64,
    pub amount: u64,
    pub voters: Vec<VoterResult>,
}

/// A voter's contribution, either to one candidate or overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterResult {
    pub name: String,
    pub phone: String,
    /// Number of completed vote rows.
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotersSummary {
    pub total_voters: u64,
    pub total_votes: u64,
    pub voters: Vec<VoterResult>,
}
