//! Ledger records.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs are stored as the document `_id`.
//! - Datetimes are serialised in MongoDB's own format.

mod ballot;
pub use ballot::{Candidate, Category, Position};

mod vote;
pub use vote::{NewVote, Vote};

mod voter;
pub use voter::{NewVoter, Voter};

#[cfg(test)]
pub use ballot::ExampleBallot;
