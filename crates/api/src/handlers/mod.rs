//! Request handlers.
//!
//! Each submodule serves one resource. Handlers extract the acting user,
//! delegate to [`crate::services`] (or straight to a repository for plain
//! CRUD) and wrap results in [`crate::response::DataResponse`].

pub mod contract;
pub mod house;
pub mod invoice;
pub mod notification;
pub mod payment;
pub mod room;
pub mod service;
