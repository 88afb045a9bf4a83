//! Repository for the `room_services` table.

use roomkeep_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::service::{CreateRoomService, RoomService, UpdateRoomService};

/// Column list for `room_services rs JOIN services s` queries.
const COLUMNS: &str = "rs.id, rs.room_id, rs.service_id, s.name AS service_name, s.unit, \
    s.is_metered, rs.price, rs.is_active, rs.description, rs.created_at, rs.updated_at";

/// Binds catalog services to rooms with a per-room price.
pub struct RoomServiceRepo;

impl RoomServiceRepo {
    /// Bind a service to a room; the price defaults to the service's
    /// default price.
    pub async fn create(
        pool: &PgPool,
        room_id: DbId,
        input: &CreateRoomService,
    ) -> Result<Option<RoomService>, sqlx::Error> {
        let query = format!(
            "WITH rs AS ( \
                INSERT INTO room_services (room_id, service_id, price, is_active, description) \
                SELECT $1, s.id, COALESCE($3, s.default_price), COALESCE($4, true), $5 \
                FROM services s WHERE s.id = $2 \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM rs JOIN services s ON s.id = rs.service_id"
        );
        sqlx::query_as::<_, RoomService>(&query)
            .bind(room_id)
            .bind(input.service_id)
            .bind(input.price)
            .bind(input.is_active)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Find a room service by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RoomService>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM room_services rs JOIN services s ON s.id = rs.service_id \
             WHERE rs.id = $1 AND rs.deleted_at IS NULL"
        );
        sqlx::query_as::<_, RoomService>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a room's live services, optionally only the active ones.
    pub async fn list_by_room<'e>(
        executor: impl PgExecutor<'e>,
        room_id: DbId,
        active_only: bool,
    ) -> Result<Vec<RoomService>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM room_services rs JOIN services s ON s.id = rs.service_id \
             WHERE rs.room_id = $1 AND rs.deleted_at IS NULL AND (NOT $2 OR rs.is_active) \
             ORDER BY s.name, rs.id"
        );
        sqlx::query_as::<_, RoomService>(&query)
            .bind(room_id)
            .bind(active_only)
            .fetch_all(executor)
            .await
    }

    /// Update a room service. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRoomService,
    ) -> Result<Option<RoomService>, sqlx::Error> {
        let query = format!(
            "WITH rs AS ( \
                UPDATE room_services SET \
                    price = COALESCE($2, price), \
                    is_active = COALESCE($3, is_active), \
                    description = COALESCE($4, description) \
                WHERE id = $1 AND deleted_at IS NULL \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM rs JOIN services s ON s.id = rs.service_id"
        );
        sqlx::query_as::<_, RoomService>(&query)
            .bind(id)
            .bind(input.price)
            .bind(input.is_active)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a room service. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE room_services SET deleted_at = NOW(), is_active = false \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
