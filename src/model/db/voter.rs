use serde::{Deserialize, Serialize};

use crate::model::common::VoterId;

/// Someone who paid for at least one vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: VoterId,
    pub name: String,
    pub phone: String,
}

/// A voter without an ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoter {
    pub name: String,
    pub phone: String,
}

impl NewVoter {
    pub fn with_id(self, id: VoterId) -> Voter {
        Voter {
            id,
            name: self.name,
            phone: self.phone,
        }
    }
}
