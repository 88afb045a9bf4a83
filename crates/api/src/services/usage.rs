//! Monthly service usage and its invoice.
//!
//! [`save_room_service_usage`] persists one period of readings for a room
//! and keeps the room's single `service_usage` invoice for that period in
//! step: service-usage items are rebuilt from the persisted usage rows,
//! manual items are left alone, and the total is re-derived from the items.
//! Everything happens in one transaction behind the room row lock; a run
//! that loses a race on the natural keys is retried from scratch.

use std::collections::{HashMap, HashSet};

use roomkeep_core::billing::{
    compute_usage, previous_period, price_for, sum_amounts, usage_item_description,
    validate_period, UsageReading, INVOICE_TYPE_SERVICE_USAGE, ITEM_SOURCE_SERVICE_USAGE,
};
use roomkeep_core::error::CoreError;
use roomkeep_core::notifications::{
    EVENT_INVOICE_CREATED, EVENT_INVOICE_DELETED, EVENT_INVOICE_UPDATED,
};
use roomkeep_core::roles::ActingUser;
use roomkeep_core::status::PaymentStatus;
use roomkeep_core::types::DbId;
use roomkeep_db::models::invoice::{InvoiceWithItems, NewInvoice, NewInvoiceItem};
use roomkeep_db::models::service::{RoomServiceUsage, ServiceUsage, UpsertServiceUsage, UsageLine};
use roomkeep_db::repositories::{InvoiceItemRepo, InvoiceRepo, RoomRepo, ServiceUsageRepo};
use roomkeep_events::{EventBus, PlatformEvent};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::{is_retryable, AppError, AppResult};
use crate::response::MaybeDeleted;
use crate::services::scope::{managed_room, payment_status, visible_room};

/// Attempts made when concurrent runs collide on a natural key.
const MAX_ATTEMPTS: usize = 3;

/// Readings submitted for one room service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceUsageEntry {
    pub room_service_id: DbId,
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: Option<f64>,
    pub description: Option<String>,
}

/// Request body for saving a room's usage for one period.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveServiceUsage {
    pub month: i16,
    pub year: i32,
    #[serde(default)]
    pub services: Vec<ServiceUsageEntry>,
    /// Services deselected by the caller: their usage for the period and the
    /// invoice items referencing it are removed.
    #[serde(default)]
    pub unchecked_room_service_ids: Vec<DbId>,
    /// Whether an existing service-usage invoice for the period may be
    /// rewritten. When `false` an existing invoice is a conflict.
    #[serde(default = "default_true")]
    pub update_invoice: bool,
    /// Description written on the invoice.
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Result of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct UsageReconciliation {
    pub room_id: DbId,
    pub month: i16,
    pub year: i32,
    /// Usage rows written by this run.
    pub usages: Vec<ServiceUsage>,
    /// The period's invoice; `None` when there was nothing to bill and no
    /// invoice existed.
    pub invoice: Option<MaybeDeleted<InvoiceWithItems>>,
}

/// One active room service with its usage for a period and the start meter
/// a new reading would continue from.
#[derive(Debug, Serialize)]
pub struct UsageView {
    #[serde(flatten)]
    pub usage: RoomServiceUsage,
    pub suggested_start_meter: Option<f64>,
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// The room's active services with their usage for `(month, year)`.
pub async fn room_service_usage(
    pool: &PgPool,
    actor: &ActingUser,
    room_id: DbId,
    month: i16,
    year: i32,
) -> AppResult<Vec<UsageView>> {
    validate_period(month, year)?;
    visible_room(pool, actor, room_id, "Room", room_id).await?;

    let (prev_month, prev_year) = previous_period(month, year);
    let rows =
        ServiceUsageRepo::list_for_period(pool, room_id, month, year, prev_month, prev_year)
            .await?;

    Ok(rows
        .into_iter()
        .map(|usage| {
            let suggested_start_meter = if usage.is_metered {
                Some(
                    usage
                        .start_meter
                        .or(usage.previous_end_meter)
                        .unwrap_or(0.0),
                )
            } else {
                None
            };
            UsageView {
                usage,
                suggested_start_meter,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Save a period of usage for a room and reconcile its service-usage
/// invoice.
pub async fn save_room_service_usage(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    room_id: DbId,
    input: &SaveServiceUsage,
) -> AppResult<UsageReconciliation> {
    validate_period(input.month, input.year)?;
    managed_room(pool, actor, room_id, "Room", room_id).await?;

    let mut attempt = 1;
    let (result, outcome) = loop {
        match reconcile_once(pool, actor, room_id, input).await {
            Err(AppError::Database(e)) if is_retryable(&e) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    error = %e,
                    room_id,
                    month = input.month,
                    year = input.year,
                    attempt,
                    "Usage reconciliation collided, retrying",
                );
                attempt += 1;
            }
            other => break other?,
        }
    };

    tracing::info!(
        room_id,
        month = input.month,
        year = input.year,
        usages = result.usages.len(),
        outcome = ?outcome,
        user_id = actor.user_id,
        "Service usage reconciled",
    );

    if let Some(event_type) = outcome.event_type() {
        let invoice_id = match &result.invoice {
            Some(MaybeDeleted::Kept(invoice)) => Some(invoice.invoice.id),
            Some(MaybeDeleted::Deleted { id, .. }) => Some(*id),
            None => None,
        };
        if let Some(invoice_id) = invoice_id {
            bus.publish(
                PlatformEvent::new(event_type)
                    .with_source("invoice", invoice_id)
                    .with_room(room_id)
                    .with_actor(actor.user_id)
                    .with_payload(serde_json::json!({
                        "month": input.month,
                        "year": input.year,
                    })),
            );
        }
    }

    Ok(result)
}

/// What happened to the period's invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoiceOutcome {
    Created,
    Updated,
    Deleted,
    Untouched,
}

impl InvoiceOutcome {
    fn event_type(self) -> Option<&'static str> {
        match self {
            InvoiceOutcome::Created => Some(EVENT_INVOICE_CREATED),
            InvoiceOutcome::Updated => Some(EVENT_INVOICE_UPDATED),
            InvoiceOutcome::Deleted => Some(EVENT_INVOICE_DELETED),
            InvoiceOutcome::Untouched => None,
        }
    }
}

async fn reconcile_once(
    pool: &PgPool,
    actor: &ActingUser,
    room_id: DbId,
    input: &SaveServiceUsage,
) -> AppResult<(UsageReconciliation, InvoiceOutcome)> {
    let (month, year) = (input.month, input.year);
    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, room_id)
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;

    let (prev_month, prev_year) = previous_period(month, year);
    let services: HashMap<DbId, RoomServiceUsage> =
        ServiceUsageRepo::list_for_period(&mut *tx, room_id, month, year, prev_month, prev_year)
            .await?
            .into_iter()
            .map(|row| (row.room_service_id, row))
            .collect();

    let existing = InvoiceRepo::find_service_usage_invoice(&mut *tx, room_id, month, year).await?;
    if let Some(invoice) = &existing {
        if payment_status(invoice.payment_status_id)? == PaymentStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "The service usage invoice for {month:02}/{year} is already paid"
            ))
            .into());
        }
        if !input.update_invoice {
            return Err(CoreError::Conflict(format!(
                "A service usage invoice for {month:02}/{year} already exists"
            ))
            .into());
        }
    }
    let invoice_id = existing.as_ref().map(|invoice| invoice.id);

    // Usage rows.
    let mut usages = Vec::new();
    let mut seen = HashSet::new();
    for entry in &input.services {
        let service = active_service(&services, entry.room_service_id, "services")?;
        if !seen.insert(entry.room_service_id) {
            return Err(CoreError::invalid_field(
                "services",
                format!("Room service {} was submitted more than once", entry.room_service_id),
            )
            .into());
        }

        let reading = UsageReading {
            start_meter: entry.start_meter,
            end_meter: entry.end_meter,
            usage_value: entry.usage_value,
        };
        let computed = compute_usage(
            &service.service_name,
            service.is_metered,
            &reading,
            service.previous_end_meter,
        )?;

        if computed.is_billable() {
            let saved = ServiceUsageRepo::upsert(
                &mut *tx,
                &UpsertServiceUsage {
                    room_service_id: entry.room_service_id,
                    month,
                    year,
                    start_meter: computed.start_meter,
                    end_meter: computed.end_meter,
                    usage_value: computed.usage_value,
                    price_used: price_for(computed.usage_value, service.price),
                    description: entry.description.clone(),
                },
            )
            .await?;
            usages.push(saved);
        } else {
            remove_usage(&mut *tx, invoice_id, service, month, year).await?;
        }
    }

    for room_service_id in &input.unchecked_room_service_ids {
        let service = active_service(&services, *room_service_id, "unchecked_room_service_ids")?;
        remove_usage(&mut *tx, invoice_id, service, month, year).await?;
        usages.retain(|u| u.room_service_id != *room_service_id);
    }

    // Invoice.
    let lines = ServiceUsageRepo::lines_for_period(&mut *tx, room_id, month, year).await?;

    let (invoice, outcome) = match existing {
        Some(invoice) => {
            InvoiceItemRepo::delete_by_source(&mut *tx, invoice.id, ITEM_SOURCE_SERVICE_USAGE)
                .await?;
            insert_usage_items(&mut *tx, invoice.id, &lines, month, year).await?;
            if let Some(description) = &input.description {
                InvoiceRepo::update_description(&mut *tx, invoice.id, description).await?;
            }
            InvoiceRepo::recompute_total(&mut *tx, invoice.id).await?;

            if InvoiceItemRepo::count_by_invoice(&mut *tx, invoice.id).await? == 0 {
                InvoiceRepo::soft_delete(&mut *tx, invoice.id).await?;
                (Some(MaybeDeleted::deleted(invoice.id)), InvoiceOutcome::Deleted)
            } else {
                let reloaded = load_with_items(&mut *tx, invoice.id).await?;
                (Some(MaybeDeleted::Kept(reloaded)), InvoiceOutcome::Updated)
            }
        }
        None if lines.is_empty() => (None, InvoiceOutcome::Untouched),
        None => {
            let created = InvoiceRepo::insert(
                &mut *tx,
                &NewInvoice {
                    room_id,
                    invoice_type: INVOICE_TYPE_SERVICE_USAGE,
                    month,
                    year,
                    total_amount: sum_amounts(lines.iter().map(|l| l.price_used)),
                    description: input.description.clone(),
                    created_by: actor.user_id,
                },
            )
            .await?;
            insert_usage_items(&mut *tx, created.id, &lines, month, year).await?;
            InvoiceRepo::recompute_total(&mut *tx, created.id).await?;
            let reloaded = load_with_items(&mut *tx, created.id).await?;
            (Some(MaybeDeleted::Kept(reloaded)), InvoiceOutcome::Created)
        }
    };

    tx.commit().await?;

    Ok((
        UsageReconciliation {
            room_id,
            month,
            year,
            usages,
            invoice,
        },
        outcome,
    ))
}

fn active_service<'a>(
    services: &'a HashMap<DbId, RoomServiceUsage>,
    room_service_id: DbId,
    field: &'static str,
) -> Result<&'a RoomServiceUsage, CoreError> {
    services.get(&room_service_id).ok_or_else(|| {
        CoreError::invalid_field(
            field,
            format!("Room service {room_service_id} is not an active service of this room"),
        )
    })
}

/// Remove a service's usage for the period: the period invoice's items
/// referencing it first, then the usage row.
async fn remove_usage(
    conn: &mut PgConnection,
    invoice_id: Option<DbId>,
    service: &RoomServiceUsage,
    month: i16,
    year: i32,
) -> AppResult<()> {
    if let (Some(invoice_id), Some(usage_id)) = (invoice_id, service.usage_id) {
        InvoiceItemRepo::delete_by_service_usage_ids(&mut *conn, invoice_id, &[usage_id]).await?;
    }
    ServiceUsageRepo::delete_for_period(&mut *conn, service.room_service_id, month, year).await?;
    Ok(())
}

async fn insert_usage_items(
    conn: &mut PgConnection,
    invoice_id: DbId,
    lines: &[UsageLine],
    month: i16,
    year: i32,
) -> AppResult<()> {
    for line in lines {
        InvoiceItemRepo::insert(
            &mut *conn,
            invoice_id,
            &NewInvoiceItem {
                source_type: ITEM_SOURCE_SERVICE_USAGE,
                service_usage_id: Some(line.service_usage_id),
                description: usage_item_description(&line.service_name, month, year),
                amount: line.price_used,
            },
        )
        .await?;
    }
    Ok(())
}

/// Re-read an invoice and its items inside the transaction.
pub(crate) async fn load_with_items(
    conn: &mut PgConnection,
    invoice_id: DbId,
) -> AppResult<InvoiceWithItems> {
    let invoice = InvoiceRepo::lock(&mut *conn, invoice_id)
        .await?
        .ok_or(AppError::not_found("Invoice", invoice_id))?;
    let items = InvoiceItemRepo::list_by_invoice(&mut *conn, invoice_id).await?;
    Ok(InvoiceWithItems { invoice, items })
}
