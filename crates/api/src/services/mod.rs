//! Domain services.
//!
//! Each operation takes the acting user explicitly, runs its writes in one
//! database transaction, and publishes [`PlatformEvent`]s only after the
//! commit. Handlers stay thin wrappers around these functions.
//!
//! [`PlatformEvent`]: roomkeep_events::PlatformEvent

pub mod contracts;
pub mod invoices;
pub mod payments;
pub mod rooms;
pub mod scope;
pub mod usage;
