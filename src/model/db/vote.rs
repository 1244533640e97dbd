use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, ExternalId, VoteId, VoteStatus, VoterId};

/// A payment-backed vote: the single source of truth for whether a vote counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: VoteId,
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
    pub external_id: ExternalId,
    pub status: VoteStatus,
    pub amount: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A vote about to be recorded as pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVote {
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
    pub external_id: ExternalId,
    pub amount: u32,
}

impl NewVote {
    /// The pending record for this vote, created at `created_at`.
    pub fn pending(self, id: VoteId, created_at: DateTime<Utc>) -> Vote {
        Vote {
            id,
            voter_id: self.voter_id,
            candidate_id: self.candidate_id,
            external_id: self.external_id,
            status: VoteStatus::Pending,
            amount: self.amount,
            created_at,
        }
    }
}
