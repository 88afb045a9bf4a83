//! House entity model and DTOs.

use roomkeep_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `houses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct House {
    pub id: DbId,
    pub name: String,
    pub address: Option<String>,
    pub manager_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHouse {
    pub name: String,
    pub address: Option<String>,
    pub manager_id: Option<DbId>,
}

/// DTO for updating a house. All fields are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHouse {
    pub name: Option<String>,
    pub address: Option<String>,
    pub manager_id: Option<DbId>,
}
