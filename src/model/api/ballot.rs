use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, CategoryId, PositionId},
    db::{Candidate, Category, Position},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDesc {
    pub id: CategoryId,
    pub name: String,
}

impl From<Category> for CategoryDesc {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDesc {
    pub id: PositionId,
    pub name: String,
    pub category_id: CategoryId,
}

impl From<Position> for PositionDesc {
    fn from(position: Position) -> Self {
        Self {
            id: position.id,
            name: position.name,
            category_id: position.category_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: CandidateId,
    pub name: String,
    pub position_id: PositionId,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            position_id: candidate.position_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPosition {
    pub name: String,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    pub position_id: PositionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedCategory {
    pub message: String,
    pub category: CategoryDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPosition {
    pub message: String,
    pub position: PositionDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedCandidate {
    pub message: String,
    pub candidate: CandidateDesc,
}

/// The positions of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionGroup {
    pub category_id: CategoryId,
    pub category_name: String,
    pub positions: Vec<PositionDesc>,
}

/// The candidates of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGroup {
    pub position_id: PositionId,
    pub position_name: String,
    pub category_name: String,
    pub candidates: Vec<CandidateDesc>,
}

/// A listing that is flat when filtered by parent, grouped by parent otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T, G> {
    Flat(Vec<T>),
    Grouped(Vec<G>),
}
