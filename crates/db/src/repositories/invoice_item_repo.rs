//! Repository for the `invoice_items` table.

use roomkeep_core::types::{DbId, Money};
use sqlx::{PgConnection, PgExecutor};

use crate::models::invoice::{InvoiceItem, NewInvoiceItem};

const COLUMNS: &str =
    "id, invoice_id, source_type, service_usage_id, description, amount, created_at, updated_at";

pub struct InvoiceItemRepo;

impl InvoiceItemRepo {
    /// Items of an invoice in insertion order.
    pub async fn list_by_invoice<'e>(
        executor: impl PgExecutor<'e>,
        invoice_id: DbId,
    ) -> Result<Vec<InvoiceItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM invoice_items WHERE invoice_id = $1 ORDER BY id");
        sqlx::query_as::<_, InvoiceItem>(&query)
            .bind(invoice_id)
            .fetch_all(executor)
            .await
    }

    pub async fn insert(
        conn: &mut PgConnection,
        invoice_id: DbId,
        input: &NewInvoiceItem,
    ) -> Result<InvoiceItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO invoice_items (invoice_id, source_type, service_usage_id, description, amount) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, InvoiceItem>(&query)
            .bind(invoice_id)
            .bind(input.source_type)
            .bind(input.service_usage_id)
            .bind(&input.description)
            .bind(input.amount)
            .fetch_one(conn)
            .await
    }

    /// Rewrite one item of an invoice.
    pub async fn update(
        conn: &mut PgConnection,
        invoice_id: DbId,
        id: DbId,
        description: &str,
        amount: Money,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoice_items SET description = $3, amount = $4 \
             WHERE id = $2 AND invoice_id = $1",
        )
        .bind(invoice_id)
        .bind(id)
        .bind(description)
        .bind(amount)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete items of an invoice by id. Returns the number removed.
    pub async fn delete_by_ids(
        conn: &mut PgConnection,
        invoice_id: DbId,
        ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1 AND id = ANY($2)")
            .bind(invoice_id)
            .bind(ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every item of one source type from an invoice.
    pub async fn delete_by_source(
        conn: &mut PgConnection,
        invoice_id: DbId,
        source_type: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1 AND source_type = $2")
                .bind(invoice_id)
                .bind(source_type)
                .execute(conn)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete items of an invoice referencing any of the given usage rows.
    pub async fn delete_by_service_usage_ids(
        conn: &mut PgConnection,
        invoice_id: DbId,
        service_usage_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM invoice_items WHERE invoice_id = $1 AND service_usage_id = ANY($2)",
        )
        .bind(invoice_id)
        .bind(service_usage_ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_invoice(conn: &mut PgConnection, invoice_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .fetch_one(conn)
            .await
    }
}
