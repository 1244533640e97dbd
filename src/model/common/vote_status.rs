use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// States in the Vote lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    /// Payment initiated, waiting for the gateway's callback.
    Pending,
    /// Payment confirmed. The only state that counts towards results.
    Completed,
    /// Payment rejected. Only written when failed votes are retained.
    Failed,
}

impl VoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Display for VoteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VoteStatus> for Bson {
    fn from(status: VoteStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_as_lowercase_string() {
        assert_eq!(Bson::from(VoteStatus::Pending), Bson::String("pending".into()));
        assert_eq!(
            Bson::from(VoteStatus::Completed).as_str(),
            Some(VoteStatus::Completed.as_str())
        );
    }
}
