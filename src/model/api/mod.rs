//! API-compatible types.
//!
//! The types in this module are serialised the way HTTP clients and the
//! payment gateway expect, e.g.:
//!
//! - Ballot entities and results use `snake_case` keys.
//! - Gateway-facing bodies use the gateway's `camelCase` keys.

mod ballot;
pub use ballot::{
    CandidateDesc, CandidateGroup, CategoryDesc, CreatedCandidate, CreatedCategory,
    CreatedPosition, Listing, NewCandidate, NewCategory, NewPosition, PositionDesc,
    PositionGroup,
};

mod payment;
pub use payment::{
    CallbackReply, Message, MpesaCallback, PaymentInput, PaymentReply, ReportUpload,
    VoteReceipt, VoteRequest,
};

mod results;
pub use results::{CandidateResult, CategoryResult, PositionResult, VoterResult, VotersSummary};
