//! Service catalog, room-service bindings and monthly usage rows.

use roomkeep_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `services` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Service {
    pub id: DbId,
    pub name: String,
    pub unit: String,
    pub is_metered: bool,
    pub default_price: Money,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateService {
    pub name: String,
    pub unit: String,
    pub is_metered: Option<bool>,
    pub default_price: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateService {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub is_metered: Option<bool>,
    pub default_price: Option<Money>,
}

/// A row from the `room_services` table joined with its service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoomService {
    pub id: DbId,
    pub room_id: DbId,
    pub service_id: DbId,
    pub service_name: String,
    pub unit: String,
    pub is_metered: bool,
    pub price: Money,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for binding a service to a room. `price` defaults to the service's
/// default price.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomService {
    pub service_id: DbId,
    pub price: Option<Money>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoomService {
    pub price: Option<Money>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

/// A row from the `service_usage` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceUsage {
    pub id: DbId,
    pub room_service_id: DbId,
    pub month: i16,
    pub year: i32,
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: f64,
    pub price_used: Money,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Natural-key upsert payload for one usage row.
#[derive(Debug, Clone)]
pub struct UpsertServiceUsage {
    pub room_service_id: DbId,
    pub month: i16,
    pub year: i32,
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: f64,
    pub price_used: Money,
    pub description: Option<String>,
}

/// One active room service with its usage for a period and the reading
/// carried over from the previous period.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoomServiceUsage {
    pub room_service_id: DbId,
    pub service_id: DbId,
    pub service_name: String,
    pub unit: String,
    pub is_metered: bool,
    pub price: Money,
    pub usage_id: Option<DbId>,
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: Option<f64>,
    pub price_used: Option<Money>,
    pub previous_end_meter: Option<f64>,
}

/// A persisted usage row with the service name, as needed to write its
/// invoice item.
#[derive(Debug, Clone, FromRow)]
pub struct UsageLine {
    pub service_usage_id: DbId,
    pub service_name: String,
    pub price_used: Money,
}
