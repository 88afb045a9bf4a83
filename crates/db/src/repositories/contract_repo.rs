//! Repository for the `contracts` and `contract_users` tables.

use chrono::NaiveDate;
use roomkeep_core::status::{ContractStatus, StatusId};
use roomkeep_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::contract::{Contract, ContractChanges, ContractFilter, NewContract};

const COLUMNS: &str = "id, room_id, start_date, end_date, monthly_price, deposit_amount, \
    deposit_status, status_id, auto_renew, time_renew, termination_reason, notes, \
    created_by, updated_by, created_at, updated_at";

/// Same columns qualified with the `c` alias, for joined queries.
const C_COLUMNS: &str = "c.id, c.room_id, c.start_date, c.end_date, c.monthly_price, \
    c.deposit_amount, c.deposit_status, c.status_id, c.auto_renew, c.time_renew, \
    c.termination_reason, c.notes, c.created_by, c.updated_by, c.created_at, c.updated_at";

/// Data access for contracts. Status-changing writes run inside the caller's
/// transaction after the room row has been locked.
pub struct ContractRepo;

impl ContractRepo {
    pub async fn insert(conn: &mut PgConnection, input: &NewContract) -> Result<Contract, sqlx::Error> {
        let query = format!(
            "INSERT INTO contracts \
                (room_id, start_date, end_date, monthly_price, deposit_amount, deposit_status, \
                 status_id, auto_renew, time_renew, notes, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(input.room_id)
            .bind(input.start_date)
            .bind(input.end_date)
            .bind(input.monthly_price)
            .bind(input.deposit_amount)
            .bind(&input.deposit_status)
            .bind(input.status_id)
            .bind(input.auto_renew)
            .bind(input.time_renew)
            .bind(&input.notes)
            .bind(input.created_by)
            .fetch_one(conn)
            .await
    }

    /// Find a contract by ID. Excludes soft-deleted rows.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contracts WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lock a contract row for the rest of the transaction.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List contracts matching `filter`, newest first.
    pub async fn list(pool: &PgPool, filter: &ContractFilter) -> Result<Vec<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {C_COLUMNS} FROM contracts c \
             JOIN rooms r ON r.id = c.room_id \
             JOIN houses h ON h.id = r.house_id \
             WHERE c.deleted_at IS NULL \
               AND ($1::BIGINT IS NULL OR c.room_id = $1) \
               AND ($2::BIGINT IS NULL OR r.house_id = $2) \
               AND ($3::SMALLINT IS NULL OR c.status_id = $3) \
               AND ($4::BIGINT IS NULL OR h.manager_id = $4) \
               AND ($5::BIGINT IS NULL OR EXISTS ( \
                    SELECT 1 FROM contract_users cu \
                    WHERE cu.contract_id = c.id AND cu.user_id = $5)) \
             ORDER BY c.created_at DESC, c.id DESC"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(filter.room_id)
            .bind(filter.house_id)
            .bind(filter.status_id)
            .bind(filter.manager_id)
            .bind(filter.tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Write the merged field set of an update.
    pub async fn update(
        conn: &mut PgConnection,
        id: DbId,
        changes: &ContractChanges,
    ) -> Result<Contract, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET \
                start_date = $2, end_date = $3, monthly_price = $4, deposit_amount = $5, \
                deposit_status = $6, status_id = $7, auto_renew = $8, time_renew = $9, \
                termination_reason = $10, notes = $11, updated_by = $12 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(changes.start_date)
            .bind(changes.end_date)
            .bind(changes.monthly_price)
            .bind(changes.deposit_amount)
            .bind(&changes.deposit_status)
            .bind(changes.status_id)
            .bind(changes.auto_renew)
            .bind(changes.time_renew)
            .bind(&changes.termination_reason)
            .bind(&changes.notes)
            .bind(changes.updated_by)
            .fetch_one(conn)
            .await
    }

    /// Soft-delete a contract. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(conn: &mut PgConnection, id: DbId, deleted_by: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE contracts SET deleted_at = NOW(), updated_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_by)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of active contracts on a room, ignoring `exclude_id`.
    pub async fn count_active_for_room(
        conn: &mut PgConnection,
        room_id: DbId,
        exclude_id: Option<DbId>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM contracts \
             WHERE room_id = $1 AND status_id = $2 AND deleted_at IS NULL \
               AND ($3::BIGINT IS NULL OR id <> $3)",
        )
        .bind(room_id)
        .bind(ContractStatus::Active.id())
        .bind(exclude_id)
        .fetch_one(conn)
        .await
    }

    /// Close every active contract on a room except `keep_id`.
    ///
    /// `updated_by = None` attributes the change to each contract's creator.
    /// Returns the closed contracts.
    pub async fn close_active_for_room(
        conn: &mut PgConnection,
        room_id: DbId,
        keep_id: Option<DbId>,
        to: ContractStatus,
        reason: &str,
        updated_by: Option<DbId>,
    ) -> Result<Vec<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET \
                status_id = $3, termination_reason = $4, updated_by = COALESCE($5, created_by) \
             WHERE room_id = $1 AND status_id = $6 AND deleted_at IS NULL \
               AND ($2::BIGINT IS NULL OR id <> $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(room_id)
            .bind(keep_id)
            .bind(to.id())
            .bind(reason)
            .bind(updated_by)
            .bind(ContractStatus::Active.id())
            .fetch_all(conn)
            .await
    }

    /// Set a contract status with a reason, attributed to its creator.
    pub async fn close(
        conn: &mut PgConnection,
        id: DbId,
        to: ContractStatus,
        reason: &str,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET \
                status_id = $2, termination_reason = $3, updated_by = created_by \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(to.id())
            .bind(reason)
            .fetch_optional(conn)
            .await
    }

    /// Push an active contract's end date forward.
    pub async fn renew(
        conn: &mut PgConnection,
        id: DbId,
        new_end_date: NaiveDate,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "UPDATE contracts SET end_date = $2 \
             WHERE id = $1 AND status_id = $3 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(new_end_date)
            .bind(ContractStatus::Active.id())
            .fetch_optional(conn)
            .await
    }

    /// Active contracts whose end date is before `today`, oldest first.
    pub async fn list_overdue_active(
        pool: &PgPool,
        today: NaiveDate,
    ) -> Result<Vec<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts \
             WHERE status_id = $1 AND end_date < $2 AND deleted_at IS NULL \
             ORDER BY end_date, id"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(ContractStatus::Active.id())
            .bind(today)
            .fetch_all(pool)
            .await
    }

    /// Replace a contract's tenant list.
    pub async fn set_tenants(
        conn: &mut PgConnection,
        contract_id: DbId,
        tenant_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM contract_users WHERE contract_id = $1")
            .bind(contract_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO contract_users (contract_id, user_id) \
             SELECT $1, user_id FROM UNNEST($2::BIGINT[]) AS t(user_id) \
             ON CONFLICT ON CONSTRAINT uq_contract_users_contract_id_user_id DO NOTHING",
        )
        .bind(contract_id)
        .bind(tenant_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Tenant user ids of a contract, lowest first.
    pub async fn tenant_ids<'e>(
        executor: impl PgExecutor<'e>,
        contract_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM contract_users WHERE contract_id = $1 ORDER BY user_id",
        )
        .bind(contract_id)
        .fetch_all(executor)
        .await
    }

    /// `(contract_id, user_id)` pairs for several contracts.
    pub async fn tenant_pairs(
        pool: &PgPool,
        contract_ids: &[DbId],
    ) -> Result<Vec<(DbId, DbId)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT contract_id, user_id FROM contract_users \
             WHERE contract_id = ANY($1) ORDER BY contract_id, user_id",
        )
        .bind(contract_ids)
        .fetch_all(pool)
        .await
    }

    /// Status of every live contract on a room, for invariant checks.
    pub async fn statuses_for_room(pool: &PgPool, room_id: DbId) -> Result<Vec<StatusId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT status_id FROM contracts WHERE room_id = $1 AND deleted_at IS NULL ORDER BY id",
        )
        .bind(room_id)
        .fetch_all(pool)
        .await
    }
}
