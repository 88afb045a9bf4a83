//! Domain logic for the rental management backend.
//!
//! Everything in this crate is free of I/O: the state-machine tables,
//! billing arithmetic, and payment code derivation are evaluated here and
//! applied by the service layer in `roomkeep-api` inside database
//! transactions.

pub mod access;
pub mod billing;
pub mod contract;
pub mod error;
pub mod notifications;
pub mod payment;
pub mod roles;
pub mod status;
pub mod types;
