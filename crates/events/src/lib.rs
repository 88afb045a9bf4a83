//! In-process domain events.
//!
//! Services publish a [`PlatformEvent`] on the [`EventBus`] after their
//! transaction commits; subscribers (the notification router) consume them
//! in the background so a failed side effect never touches the primary
//! write.

pub mod bus;

pub use bus::{EventBus, PlatformEvent};
