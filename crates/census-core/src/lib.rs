//! Core types and engine logic for census submission tracking.
//!
//! Raw counts come in as fact rows; totals and completion are derived from
//! them on every read, and a per-type ledger records final, lockable
//! submissions. This crate has no HTTP or database dependencies; all other
//! crates depend on it.

// Native `async fn` in traits; suppress the advisory lint about `Send`
// bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod completion;
pub mod error;
pub mod fact;
pub mod ledger;
pub mod policy;
pub mod roster;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
