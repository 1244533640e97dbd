mod external_id;
pub use external_id::ExternalId;

mod msisdn;
pub use msisdn::{Msisdn, MsisdnError};

mod vote_status;
pub use vote_status::VoteStatus;

/// Identifiers are allocated by the ledger, counting up from 1 per entity kind.
pub type CategoryId = u32;
pub type PositionId = u32;
pub type CandidateId = u32;
pub type VoterId = u32;
pub type VoteId = u32;
