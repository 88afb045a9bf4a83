//! Invoice and invoice item models.

use roomkeep_core::status::StatusId;
use roomkeep_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `invoices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invoice {
    pub id: DbId,
    pub room_id: DbId,
    pub invoice_type: String,
    pub month: i16,
    pub year: i32,
    pub total_amount: Money,
    pub description: Option<String>,
    pub payment_method_id: Option<i16>,
    pub payment_status_id: StatusId,
    pub payment_date: Option<Timestamp>,
    pub transaction_code: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `invoice_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceItem {
    pub id: DbId,
    pub invoice_id: DbId,
    pub source_type: String,
    pub service_usage_id: Option<DbId>,
    pub description: String,
    pub amount: Money,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An invoice with its items.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Insert payload for an invoice header.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub room_id: DbId,
    pub invoice_type: &'static str,
    pub month: i16,
    pub year: i32,
    pub total_amount: Money,
    pub description: Option<String>,
    pub created_by: DbId,
}

/// Insert payload for an invoice item.
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub source_type: &'static str,
    pub service_usage_id: Option<DbId>,
    pub description: String,
    pub amount: Money,
}

/// A manual item as submitted by an editor. Items with an `id` update an
/// existing manual item; items without one are created.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualItemInput {
    pub id: Option<DbId>,
    pub description: String,
    pub amount: Money,
}

/// Request body for creating a custom invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub month: i16,
    pub year: i32,
    pub description: Option<String>,
    pub items: Vec<ManualItemInput>,
}

/// Request body for editing an invoice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoice {
    pub description: Option<String>,
    /// Full list of manual items to keep. `None` leaves manual items alone.
    pub items: Option<Vec<ManualItemInput>>,
    /// Service usage rows to delete together with their invoice items.
    #[serde(default)]
    pub delete_service_usage_ids: Vec<DbId>,
}

/// Filters for listing invoices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub room_id: Option<DbId>,
    pub month: Option<i16>,
    pub year: Option<i32>,
    pub payment_status_id: Option<StatusId>,
    pub manager_id: Option<DbId>,
    /// Restrict to rooms where this user holds or held a contract.
    pub tenant_id: Option<DbId>,
}
