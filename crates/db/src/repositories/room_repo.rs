//! Repository for the `rooms` table.

use roomkeep_core::status::{ContractStatus, StatusId};
use roomkeep_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::room::{CreateRoom, Room, RoomScope, UpdateRoom};

const COLUMNS: &str =
    "id, house_id, name, capacity, base_price, status_id, description, created_at, updated_at";

/// Provides CRUD operations for rooms. Status writes are only issued by the
/// contract state machine and the room status operation.
pub struct RoomRepo;

impl RoomRepo {
    /// Insert a room under `house_id`. New rooms start `available`.
    pub async fn create(pool: &PgPool, house_id: DbId, input: &CreateRoom) -> Result<Room, sqlx::Error> {
        let query = format!(
            "INSERT INTO rooms (house_id, name, capacity, base_price, description) \
             VALUES ($1, $2, COALESCE($3, 1), COALESCE($4, 0), $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(house_id)
            .bind(&input.name)
            .bind(input.capacity)
            .bind(input.base_price)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a room by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the live rooms of a house by name.
    pub async fn list_by_house(pool: &PgPool, house_id: DbId) -> Result<Vec<Room>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rooms \
             WHERE house_id = $1 AND deleted_at IS NULL \
             ORDER BY name, id"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(house_id)
            .fetch_all(pool)
            .await
    }

    /// Update a room's descriptive fields. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRoom,
    ) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "UPDATE rooms SET \
                name = COALESCE($2, name), \
                capacity = COALESCE($3, capacity), \
                base_price = COALESCE($4, base_price), \
                description = COALESCE($5, description) \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.capacity)
            .bind(input.base_price)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a room. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE rooms SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a room's house and the house manager for ownership checks.
    pub async fn find_scope(pool: &PgPool, room_id: DbId) -> Result<Option<RoomScope>, sqlx::Error> {
        sqlx::query_as::<_, RoomScope>(
            "SELECT r.id AS room_id, r.house_id, r.status_id, h.manager_id \
             FROM rooms r JOIN houses h ON h.id = r.house_id \
             WHERE r.id = $1 AND r.deleted_at IS NULL AND h.deleted_at IS NULL",
        )
        .bind(room_id)
        .fetch_optional(pool)
        .await
    }

    /// Lock a room row for the rest of the transaction.
    ///
    /// Every operation that reads then rewrites a room's contracts, usage or
    /// invoices takes this lock first, which serialises them per room.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rooms WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Write a room status.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status_id: StatusId,
    ) -> Result<Option<Room>, sqlx::Error> {
        let query = format!(
            "UPDATE rooms SET status_id = $2 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(status_id)
            .fetch_optional(conn)
            .await
    }

    /// Tenants on the room's contracts, lowest id first.
    ///
    /// With `active_only` only the current active contract counts; otherwise
    /// every non-draft contract (past tenants keep read access to their
    /// invoices).
    pub async fn tenant_ids(
        pool: &PgPool,
        room_id: DbId,
        active_only: bool,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT cu.user_id FROM contract_users cu \
             JOIN contracts c ON c.id = cu.contract_id \
             WHERE c.room_id = $1 AND c.deleted_at IS NULL \
               AND (CASE WHEN $2 THEN c.status_id = $3 ELSE c.status_id <> $4 END) \
             ORDER BY cu.user_id",
        )
        .bind(room_id)
        .bind(active_only)
        .bind(ContractStatus::Active.id())
        .bind(ContractStatus::Draft.id())
        .fetch_all(pool)
        .await
    }
}
