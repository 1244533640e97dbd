//! Data types, split by where they live:
//!
//! - [`common`]: identifiers and enums shared by every layer.
//! - [`db`]: records as stored in the ledger.
//! - [`api`]: request and response bodies of the HTTP interface.
//! - [`mongodb`]: MongoDB plumbing for the durable ledger.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
