//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Single-statement reads and writes take `&PgPool`; steps of a larger
//! transaction take `&mut PgConnection` (pass `&mut *tx`).

pub mod contract_repo;
pub mod house_repo;
pub mod invoice_item_repo;
pub mod invoice_repo;
pub mod notification_repo;
pub mod room_repo;
pub mod room_service_repo;
pub mod service_repo;
pub mod service_usage_repo;
pub mod user_repo;

pub use contract_repo::ContractRepo;
pub use house_repo::HouseRepo;
pub use invoice_item_repo::InvoiceItemRepo;
pub use invoice_repo::InvoiceRepo;
pub use notification_repo::NotificationRepo;
pub use room_repo::RoomRepo;
pub use room_service_repo::RoomServiceRepo;
pub use service_repo::ServiceRepo;
pub use service_usage_repo::ServiceUsageRepo;
pub use user_repo::UserRepo;
