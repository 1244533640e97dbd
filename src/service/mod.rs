//! The vote/payment protocol and result aggregation.
//!
//! Services borrow the ledger, gateway and config for the duration of one
//! operation; routes build them from managed state on each request.

mod intent;
pub use intent::{VoteIntent, VoteIntents};

mod payment;
pub use payment::Payments;

mod reconcile;
pub use reconcile::{Reconciler, Settlement};

mod standings;
pub use standings::{rank_position, Standings};
