//! Room entity model and DTOs.

use roomkeep_core::status::StatusId;
use roomkeep_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `rooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Room {
    pub id: DbId,
    pub house_id: DbId,
    pub name: String,
    pub capacity: i32,
    pub base_price: Money,
    pub status_id: StatusId,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A room together with the manager of its house, used for ownership checks.
#[derive(Debug, Clone, FromRow)]
pub struct RoomScope {
    pub room_id: DbId,
    pub house_id: DbId,
    pub status_id: StatusId,
    pub manager_id: Option<DbId>,
}

/// DTO for creating a room. New rooms always start `available`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    pub capacity: Option<i32>,
    pub base_price: Option<Money>,
    pub description: Option<String>,
}

/// DTO for updating a room's descriptive fields. Status changes go through
/// the dedicated status operation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoom {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub base_price: Option<Money>,
    pub description: Option<String>,
}
