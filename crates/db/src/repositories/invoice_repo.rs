//! Repository for the `invoices` table.

use roomkeep_core::billing::INVOICE_TYPE_SERVICE_USAGE;
use roomkeep_core::status::{ContractStatus, PaymentStatus};
use roomkeep_core::types::{DbId, Money};
use sqlx::{PgConnection, PgPool};

use crate::models::invoice::{Invoice, InvoiceFilter, NewInvoice};

const COLUMNS: &str = "id, room_id, invoice_type, month, year, total_amount, description, \
    payment_method_id, payment_status_id, payment_date, transaction_code, created_by, \
    created_at, updated_at";

const I_COLUMNS: &str = "i.id, i.room_id, i.invoice_type, i.month, i.year, i.total_amount, \
    i.description, i.payment_method_id, i.payment_status_id, i.payment_date, \
    i.transaction_code, i.created_by, i.created_at, i.updated_at";

/// Data access for invoice headers. Totals are only ever written by
/// [`InvoiceRepo::recompute_total`].
pub struct InvoiceRepo;

impl InvoiceRepo {
    pub async fn insert(conn: &mut PgConnection, input: &NewInvoice) -> Result<Invoice, sqlx::Error> {
        let query = format!(
            "INSERT INTO invoices \
                (room_id, invoice_type, month, year, total_amount, description, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(input.room_id)
            .bind(input.invoice_type)
            .bind(input.month)
            .bind(input.year)
            .bind(input.total_amount)
            .bind(&input.description)
            .bind(input.created_by)
            .fetch_one(conn)
            .await
    }

    /// Find an invoice by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Invoice>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM invoices WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an invoice row for the rest of the transaction.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM invoices WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lock several invoices in id order.
    pub async fn lock_many(conn: &mut PgConnection, ids: &[DbId]) -> Result<Vec<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM invoices WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY id FOR UPDATE"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(ids)
            .fetch_all(conn)
            .await
    }

    /// The live service-usage invoice of a room for a period, locked.
    pub async fn find_service_usage_invoice(
        conn: &mut PgConnection,
        room_id: DbId,
        month: i16,
        year: i32,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM invoices \
             WHERE room_id = $1 AND month = $2 AND year = $3 AND invoice_type = $4 \
               AND deleted_at IS NULL \
             FOR UPDATE"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(room_id)
            .bind(month)
            .bind(year)
            .bind(INVOICE_TYPE_SERVICE_USAGE)
            .fetch_optional(conn)
            .await
    }

    /// List invoices matching `filter`, newest period first.
    pub async fn list(pool: &PgPool, filter: &InvoiceFilter) -> Result<Vec<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {I_COLUMNS} FROM invoices i \
             JOIN rooms r ON r.id = i.room_id \
             JOIN houses h ON h.id = r.house_id \
             WHERE i.deleted_at IS NULL \
               AND ($1::BIGINT IS NULL OR i.room_id = $1) \
               AND ($2::SMALLINT IS NULL OR i.month = $2) \
               AND ($3::INTEGER IS NULL OR i.year = $3) \
               AND ($4::SMALLINT IS NULL OR i.payment_status_id = $4) \
               AND ($5::BIGINT IS NULL OR h.manager_id = $5) \
               AND ($6::BIGINT IS NULL OR EXISTS ( \
                    SELECT 1 FROM contracts c \
                    JOIN contract_users cu ON cu.contract_id = c.id \
                    WHERE c.room_id = i.room_id AND cu.user_id = $6 \
                      AND c.deleted_at IS NULL AND c.status_id <> $7)) \
             ORDER BY i.year DESC, i.month DESC, i.id DESC"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(filter.room_id)
            .bind(filter.month)
            .bind(filter.year)
            .bind(filter.payment_status_id)
            .bind(filter.manager_id)
            .bind(filter.tenant_id)
            .bind(ContractStatus::Draft.id())
            .fetch_all(pool)
            .await
    }

    pub async fn update_description(
        conn: &mut PgConnection,
        id: DbId,
        description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE invoices SET description = $2 WHERE id = $1")
            .bind(id)
            .bind(description)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Re-derive `total_amount` from the persisted items and return it.
    pub async fn recompute_total(conn: &mut PgConnection, id: DbId) -> Result<Money, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE invoices SET total_amount = ( \
                SELECT COALESCE(SUM(amount), 0)::BIGINT FROM invoice_items WHERE invoice_id = $1 \
             ) \
             WHERE id = $1 \
             RETURNING total_amount",
        )
        .bind(id)
        .fetch_one(conn)
        .await
    }

    /// Soft-delete an invoice. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Link invoices to a gateway order.
    pub async fn attach_transaction(
        conn: &mut PgConnection,
        ids: &[DbId],
        transaction_code: &str,
        payment_method_id: i16,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET transaction_code = $2, payment_method_id = $3 \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .bind(transaction_code)
        .bind(payment_method_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Lock the invoices carrying `transaction_code` that are not yet
    /// completed.
    pub async fn lock_unsettled_by_transaction_code(
        conn: &mut PgConnection,
        transaction_code: &str,
    ) -> Result<Vec<Invoice>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM invoices \
             WHERE transaction_code = $1 AND payment_status_id <> $2 AND deleted_at IS NULL \
             ORDER BY id FOR UPDATE"
        );
        sqlx::query_as::<_, Invoice>(&query)
            .bind(transaction_code)
            .bind(PaymentStatus::Completed.id())
            .fetch_all(conn)
            .await
    }

    /// Mark invoices completed, skipping any already completed. Returns the
    /// ids actually updated.
    pub async fn mark_completed(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE invoices SET payment_status_id = $2, payment_date = NOW() \
             WHERE id = ANY($1) AND payment_status_id <> $2 AND deleted_at IS NULL \
             RETURNING id",
        )
        .bind(ids)
        .bind(PaymentStatus::Completed.id())
        .fetch_all(conn)
        .await
    }

    /// Set the payment status (and optionally the method) of invoices.
    pub async fn set_payment_status(
        conn: &mut PgConnection,
        ids: &[DbId],
        status: PaymentStatus,
        payment_method_id: Option<i16>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET \
                payment_status_id = $2, \
                payment_method_id = COALESCE($3, payment_method_id) \
             WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .bind(status.id())
        .bind(payment_method_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
