//! Repository for the `houses` table.

use roomkeep_core::status::RoomStatus;
use roomkeep_core::types::DbId;
use sqlx::PgPool;

use crate::models::house::{CreateHouse, House, UpdateHouse};

const COLUMNS: &str = "id, name, address, manager_id, created_at, updated_at";

/// Provides CRUD operations for houses.
pub struct HouseRepo;

impl HouseRepo {
    pub async fn create(pool: &PgPool, input: &CreateHouse) -> Result<House, sqlx::Error> {
        let query = format!(
            "INSERT INTO houses (name, address, manager_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, House>(&query)
            .bind(&input.name)
            .bind(&input.address)
            .bind(input.manager_id)
            .fetch_one(pool)
            .await
    }

    /// Find a house by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<House>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM houses WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, House>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List houses by name, optionally restricted to one manager.
    pub async fn list(pool: &PgPool, manager_id: Option<DbId>) -> Result<Vec<House>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM houses \
             WHERE deleted_at IS NULL AND ($1::BIGINT IS NULL OR manager_id = $1) \
             ORDER BY name, id"
        );
        sqlx::query_as::<_, House>(&query)
            .bind(manager_id)
            .fetch_all(pool)
            .await
    }

    /// Update a house. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateHouse,
    ) -> Result<Option<House>, sqlx::Error> {
        let query = format!(
            "UPDATE houses SET \
                name = COALESCE($2, name), \
                address = COALESCE($3, address), \
                manager_id = COALESCE($4, manager_id) \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, House>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.address)
            .bind(input.manager_id)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a house. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE houses SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of live rooms in a house that are currently occupied.
    pub async fn count_used_rooms(pool: &PgPool, id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM rooms \
             WHERE house_id = $1 AND status_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(RoomStatus::Used.id())
        .fetch_one(pool)
        .await
    }
}
