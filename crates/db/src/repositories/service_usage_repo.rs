//! Repository for the `service_usage` table.
//!
//! Rows are keyed naturally by `(room_service_id, month, year)`; writes are
//! upserts on that key and zero usage removes the row.

use roomkeep_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::models::service::{RoomServiceUsage, ServiceUsage, UpsertServiceUsage, UsageLine};

const COLUMNS: &str = "id, room_service_id, month, year, start_meter, end_meter, usage_value, \
    price_used, description, created_at, updated_at";

pub struct ServiceUsageRepo;

impl ServiceUsageRepo {
    /// Active services of a room with their usage for `(month, year)` and
    /// the end meter of `(prev_month, prev_year)`.
    pub async fn list_for_period<'e>(
        executor: impl PgExecutor<'e>,
        room_id: DbId,
        month: i16,
        year: i32,
        prev_month: i16,
        prev_year: i32,
    ) -> Result<Vec<RoomServiceUsage>, sqlx::Error> {
        sqlx::query_as::<_, RoomServiceUsage>(
            "SELECT rs.id AS room_service_id, s.id AS service_id, s.name AS service_name, \
                    s.unit, s.is_metered, rs.price, \
                    cur.id AS usage_id, cur.start_meter, cur.end_meter, cur.usage_value, \
                    cur.price_used, prev.end_meter AS previous_end_meter \
             FROM room_services rs \
             JOIN services s ON s.id = rs.service_id \
             LEFT JOIN service_usage cur \
                ON cur.room_service_id = rs.id AND cur.month = $2 AND cur.year = $3 \
             LEFT JOIN service_usage prev \
                ON prev.room_service_id = rs.id AND prev.month = $4 AND prev.year = $5 \
             WHERE rs.room_id = $1 AND rs.deleted_at IS NULL AND rs.is_active \
             ORDER BY s.name, rs.id",
        )
        .bind(room_id)
        .bind(month)
        .bind(year)
        .bind(prev_month)
        .bind(prev_year)
        .fetch_all(executor)
        .await
    }

    /// Insert or update the usage row for its natural key.
    pub async fn upsert(
        conn: &mut PgConnection,
        input: &UpsertServiceUsage,
    ) -> Result<ServiceUsage, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_usage \
                (room_service_id, month, year, start_meter, end_meter, usage_value, price_used, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_service_usage_room_service_id_month_year DO UPDATE SET \
                start_meter = EXCLUDED.start_meter, \
                end_meter = EXCLUDED.end_meter, \
                usage_value = EXCLUDED.usage_value, \
                price_used = EXCLUDED.price_used, \
                description = EXCLUDED.description \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceUsage>(&query)
            .bind(input.room_service_id)
            .bind(input.month)
            .bind(input.year)
            .bind(input.start_meter)
            .bind(input.end_meter)
            .bind(input.usage_value)
            .bind(input.price_used)
            .bind(&input.description)
            .fetch_one(conn)
            .await
    }

    /// Delete the usage row for a natural key, returning its id if one
    /// existed.
    pub async fn delete_for_period(
        conn: &mut PgConnection,
        room_service_id: DbId,
        month: i16,
        year: i32,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "DELETE FROM service_usage \
             WHERE room_service_id = $1 AND month = $2 AND year = $3 \
             RETURNING id",
        )
        .bind(room_service_id)
        .bind(month)
        .bind(year)
        .fetch_optional(conn)
        .await
    }

    /// Ids among `ids` that are usage rows of `room_id` for `(month, year)`.
    pub async fn filter_ids_for_room_period(
        conn: &mut PgConnection,
        room_id: DbId,
        month: i16,
        year: i32,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT su.id FROM service_usage su \
             JOIN room_services rs ON rs.id = su.room_service_id \
             WHERE su.id = ANY($1) AND rs.room_id = $2 AND su.month = $3 AND su.year = $4 \
             ORDER BY su.id",
        )
        .bind(ids)
        .bind(room_id)
        .bind(month)
        .bind(year)
        .fetch_all(conn)
        .await
    }

    /// Hard-delete usage rows by id. Returns the number removed.
    pub async fn delete_by_ids(conn: &mut PgConnection, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM service_usage WHERE id = ANY($1)")
            .bind(ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Billable usage rows of a room's active services for a period, with
    /// service names, in service-name order.
    pub async fn lines_for_period(
        conn: &mut PgConnection,
        room_id: DbId,
        month: i16,
        year: i32,
    ) -> Result<Vec<UsageLine>, sqlx::Error> {
        sqlx::query_as::<_, UsageLine>(
            "SELECT su.id AS service_usage_id, s.name AS service_name, su.price_used \
             FROM service_usage su \
             JOIN room_services rs ON rs.id = su.room_service_id \
             JOIN services s ON s.id = rs.service_id \
             WHERE rs.room_id = $1 AND su.month = $2 AND su.year = $3 \
               AND rs.deleted_at IS NULL AND rs.is_active AND su.usage_value > 0 \
             ORDER BY s.name, su.id",
        )
        .bind(room_id)
        .bind(month)
        .bind(year)
        .fetch_all(conn)
        .await
    }

    /// Usage rows of one room service, newest period first.
    pub async fn list_by_room_service<'e>(
        executor: impl PgExecutor<'e>,
        room_service_id: DbId,
    ) -> Result<Vec<ServiceUsage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM service_usage WHERE room_service_id = $1 \
             ORDER BY year DESC, month DESC"
        );
        sqlx::query_as::<_, ServiceUsage>(&query)
            .bind(room_service_id)
            .fetch_all(executor)
            .await
    }
}
