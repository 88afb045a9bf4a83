use std::sync::Arc;

use roomkeep_gateway::PaymentGateway;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: roomkeep_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Bus for committed state changes; feeds the notification router.
    pub event_bus: Arc<roomkeep_events::EventBus>,
    /// Remote payment gateway.
    pub gateway: Arc<dyn PaymentGateway>,
}
