//! Notification routing infrastructure.
//!
//! The [`NotificationRouter`] subscribes to the event bus and stores a
//! notification row for every user an event concerns.

pub mod router;

pub use router::NotificationRouter;
