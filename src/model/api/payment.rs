use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, ExternalId};

/// A vote submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter_name: String,
    pub voter_phone: String,
    pub candidate_id: CandidateId,
    /// Signed so that non-positive amounts reach validation instead of
    /// failing deserialisation.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub message: String,
    #[serde(rename = "externalId")]
    pub external_id: ExternalId,
}

/// The body the gateway posts once a payment is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpesaCallback {
    pub external_id: ExternalId,
    pub transaction_status: String,
    #[serde(default)]
    pub transaction_report: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub net_amount: Option<String>,
    #[serde(default)]
    pub secure_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackReply {
    pub message: String,
    /// One of `completed`, `deleted`, `failed` or `not_found`.
    pub status: String,
    #[serde(rename = "externalId")]
    pub external_id: ExternalId,
}

/// A payment initiated directly, with no vote attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub phone: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReply {
    pub message: String,
    pub transaction: ExternalId,
}

/// A plain-text transaction report from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportUpload {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
