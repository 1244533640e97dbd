use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, CategoryId, PositionId};

/// Root of the ballot hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: CategoryId,
    pub name: String,
}

/// A seat contested within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: PositionId,
    pub name: String,
    pub category_id: CategoryId,
}

/// Someone standing for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    pub name: String,
    pub position_id: PositionId,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;
    use crate::ledger::{Ledger, LedgerError};

    /// One category holding one position with two candidates.
    pub struct ExampleBallot {
        pub category: Category,
        pub position: Position,
        pub candidates: [Candidate; 2],
    }

    impl ExampleBallot {
        /// Insert the example ballot. On a fresh ledger the IDs are all 1,
        /// apart from the second candidate which is 2.
        pub async fn insert(ledger: &dyn Ledger) -> Result<Self, LedgerError> {
            let category = ledger.insert_category("Best Artist".to_string()).await?;
            let position = ledger
                .insert_position("Female Vocalist".to_string(), category.id)
                .await?;
            let first = ledger
                .insert_candidate("Wanjiru".to_string(), position.id)
                .await?;
            let second = ledger
                .insert_candidate("Achieng".to_string(), position.id)
                .await?;
            Ok(Self {
                category,
                position,
                candidates: [first, second],
            })
        }
    }
}

#[cfg(test)]
pub use examples::ExampleBallot;
