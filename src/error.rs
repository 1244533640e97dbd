use log::{error, warn};
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use serde::Serialize;
use thiserror::Error;

use crate::{
    gateway::GatewayError,
    ledger::LedgerError,
    model::common::{CandidateId, ExternalId},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Candidate with ID '{0}' not found")]
    CandidateNotFound(CandidateId),
    #[error("No pending vote with external ID '{0}'")]
    PendingVoteNotFound(ExternalId),
    #[error("{0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Voter conflict: {0}")]
    VoterConflict(String),
    #[error("Payment gateway failure: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] LedgerError),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::CandidateNotFound(_) | Self::PendingVoteNotFound(_) | Self::NotFound(_) => {
                Status::NotFound
            }
            Self::Validation(_) => Status::BadRequest,
            Self::VoterConflict(_) => Status::Conflict,
            Self::Gateway(_) => Status::BadGateway,
            Self::Persistence(_) => Status::InternalServerError,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
