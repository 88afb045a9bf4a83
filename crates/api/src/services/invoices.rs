//! Invoice creation, editing and deletion.
//!
//! Edits diff the submitted manual items against the stored ones, may drop
//! service usage rows together with their items, and always finish by
//! re-deriving the total from the items. An invoice left without items is
//! deleted and reported as such.

use std::collections::HashSet;

use roomkeep_core::billing::{
    diff_manual_items, sum_amounts, validate_manual_item, validate_period, INVOICE_TYPE_CUSTOM,
    INVOICE_TYPE_SERVICE_USAGE, ITEM_SOURCE_MANUAL,
};
use roomkeep_core::error::CoreError;
use roomkeep_core::notifications::{
    EVENT_INVOICE_CREATED, EVENT_INVOICE_DELETED, EVENT_INVOICE_UPDATED,
};
use roomkeep_core::roles::{ActingUser, Role};
use roomkeep_core::status::PaymentStatus;
use roomkeep_core::types::DbId;
use roomkeep_db::models::invoice::{
    CreateInvoice, Invoice, InvoiceFilter, InvoiceWithItems, ManualItemInput, NewInvoice,
    NewInvoiceItem, UpdateInvoice,
};
use roomkeep_db::repositories::{InvoiceItemRepo, InvoiceRepo, RoomRepo, ServiceUsageRepo};
use roomkeep_events::{EventBus, PlatformEvent};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::response::MaybeDeleted;
use crate::services::scope::{managed_room, payment_status, visible_room};
use crate::services::usage::load_with_items;

/// Create a custom invoice with manual items for a room.
pub async fn create_custom(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    room_id: DbId,
    input: &CreateInvoice,
) -> AppResult<InvoiceWithItems> {
    validate_period(input.month, input.year)?;
    if input.items.is_empty() {
        return Err(CoreError::invalid_field("items", "An invoice needs at least one item").into());
    }
    for item in &input.items {
        if item.id.is_some() {
            return Err(CoreError::invalid_field(
                "items",
                "New invoice items cannot carry an id",
            )
            .into());
        }
        validate_manual_item(&item.description, item.amount)?;
    }
    managed_room(pool, actor, room_id, "Room", room_id).await?;

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, room_id)
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;

    let invoice = InvoiceRepo::insert(
        &mut *tx,
        &NewInvoice {
            room_id,
            invoice_type: INVOICE_TYPE_CUSTOM,
            month: input.month,
            year: input.year,
            total_amount: sum_amounts(input.items.iter().map(|i| i.amount)),
            description: input.description.clone(),
            created_by: actor.user_id,
        },
    )
    .await?;
    for item in &input.items {
        insert_manual_item(&mut *tx, invoice.id, item).await?;
    }
    InvoiceRepo::recompute_total(&mut *tx, invoice.id).await?;
    let created = load_with_items(&mut *tx, invoice.id).await?;

    tx.commit().await?;

    tracing::info!(
        invoice_id = created.invoice.id,
        room_id,
        total_amount = created.invoice.total_amount,
        user_id = actor.user_id,
        "Custom invoice created",
    );
    bus.publish(invoice_event(EVENT_INVOICE_CREATED, &created.invoice, actor));

    Ok(created)
}

/// An invoice the actor may read, with its items.
pub async fn get(pool: &PgPool, actor: &ActingUser, id: DbId) -> AppResult<InvoiceWithItems> {
    let invoice = InvoiceRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    visible_room(pool, actor, invoice.room_id, "Invoice", id).await?;
    let items = InvoiceItemRepo::list_by_invoice(pool, id).await?;
    Ok(InvoiceWithItems { invoice, items })
}

/// Invoices visible to the actor, narrowed by `filter`.
pub async fn list(
    pool: &PgPool,
    actor: &ActingUser,
    mut filter: InvoiceFilter,
) -> AppResult<Vec<Invoice>> {
    match actor.role {
        Role::Admin => {}
        Role::Manager => filter.manager_id = Some(actor.user_id),
        Role::Tenant => filter.tenant_id = Some(actor.user_id),
    }
    Ok(InvoiceRepo::list(pool, &filter).await?)
}

/// Edit an invoice's description, manual items and service usage.
pub async fn update(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    id: DbId,
    input: &UpdateInvoice,
) -> AppResult<MaybeDeleted<InvoiceWithItems>> {
    if let Some(items) = &input.items {
        for item in items {
            validate_manual_item(&item.description, item.amount)?;
        }
    }
    let existing = InvoiceRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    managed_room(pool, actor, existing.room_id, "Invoice", id).await?;

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, existing.room_id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    let invoice = InvoiceRepo::lock(&mut *tx, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    ensure_editable(&invoice)?;

    if let Some(description) = &input.description {
        InvoiceRepo::update_description(&mut *tx, id, description).await?;
    }

    if let Some(items) = &input.items {
        let existing_manual: Vec<DbId> = InvoiceItemRepo::list_by_invoice(&mut *tx, id)
            .await?
            .into_iter()
            .filter(|item| item.source_type == ITEM_SOURCE_MANUAL)
            .map(|item| item.id)
            .collect();
        let submitted: Vec<Option<DbId>> = items.iter().map(|item| item.id).collect();
        let diff = diff_manual_items(&existing_manual, &submitted)?;

        if !diff.to_delete.is_empty() {
            InvoiceItemRepo::delete_by_ids(&mut *tx, id, &diff.to_delete).await?;
        }
        for item in items {
            match item.id {
                Some(item_id) => {
                    InvoiceItemRepo::update(
                        &mut *tx,
                        id,
                        item_id,
                        item.description.trim(),
                        item.amount,
                    )
                    .await?;
                }
                None => {
                    insert_manual_item(&mut *tx, id, item).await?;
                }
            }
        }
    }

    if !input.delete_service_usage_ids.is_empty() {
        if invoice.invoice_type != INVOICE_TYPE_SERVICE_USAGE {
            return Err(CoreError::invalid_field(
                "delete_service_usage_ids",
                format!("Invoice {id} does not bill service usage"),
            )
            .into());
        }
        let requested: HashSet<DbId> = input.delete_service_usage_ids.iter().copied().collect();
        let owned = ServiceUsageRepo::filter_ids_for_room_period(
            &mut *tx,
            invoice.room_id,
            invoice.month,
            invoice.year,
            &input.delete_service_usage_ids,
        )
        .await?;
        if let Some(stray) = requested.iter().find(|usage_id| !owned.contains(usage_id)) {
            return Err(CoreError::invalid_field(
                "delete_service_usage_ids",
                format!("Service usage {stray} does not belong to this invoice's room and period"),
            )
            .into());
        }
        InvoiceItemRepo::delete_by_service_usage_ids(&mut *tx, id, &owned).await?;
        ServiceUsageRepo::delete_by_ids(&mut *tx, &owned).await?;
    }

    InvoiceRepo::recompute_total(&mut *tx, id).await?;

    let result = if InvoiceItemRepo::count_by_invoice(&mut *tx, id).await? == 0 {
        InvoiceRepo::soft_delete(&mut *tx, id).await?;
        MaybeDeleted::deleted(id)
    } else {
        MaybeDeleted::Kept(load_with_items(&mut *tx, id).await?)
    };

    tx.commit().await?;

    tracing::info!(
        invoice_id = id,
        room_id = invoice.room_id,
        deleted = result.is_deleted(),
        user_id = actor.user_id,
        "Invoice updated",
    );
    let event_type = if result.is_deleted() {
        EVENT_INVOICE_DELETED
    } else {
        EVENT_INVOICE_UPDATED
    };
    bus.publish(invoice_event(event_type, &invoice, actor));

    Ok(result)
}

/// Soft-delete an invoice. Paid invoices cannot be deleted.
pub async fn delete(pool: &PgPool, bus: &EventBus, actor: &ActingUser, id: DbId) -> AppResult<()> {
    let existing = InvoiceRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    managed_room(pool, actor, existing.room_id, "Invoice", id).await?;

    let mut tx = pool.begin().await?;
    let invoice = InvoiceRepo::lock(&mut *tx, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    ensure_editable(&invoice)?;
    InvoiceRepo::soft_delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(
        invoice_id = id,
        room_id = invoice.room_id,
        user_id = actor.user_id,
        "Invoice deleted",
    );
    bus.publish(invoice_event(EVENT_INVOICE_DELETED, &invoice, actor));
    Ok(())
}

fn ensure_editable(invoice: &Invoice) -> AppResult<()> {
    if payment_status(invoice.payment_status_id)? == PaymentStatus::Completed {
        return Err(CoreError::Conflict(format!(
            "Invoice {} is already paid and can no longer be changed",
            invoice.id
        ))
        .into());
    }
    Ok(())
}

async fn insert_manual_item(
    conn: &mut PgConnection,
    invoice_id: DbId,
    item: &ManualItemInput,
) -> AppResult<()> {
    InvoiceItemRepo::insert(
        conn,
        invoice_id,
        &NewInvoiceItem {
            source_type: ITEM_SOURCE_MANUAL,
            service_usage_id: None,
            description: item.description.trim().to_string(),
            amount: item.amount,
        },
    )
    .await?;
    Ok(())
}

fn invoice_event(event_type: &str, invoice: &Invoice, actor: &ActingUser) -> PlatformEvent {
    PlatformEvent::new(event_type)
        .with_source("invoice", invoice.id)
        .with_room(invoice.room_id)
        .with_actor(actor.user_id)
        .with_payload(serde_json::json!({
            "month": invoice.month,
            "year": invoice.year,
            "invoice_type": invoice.invoice_type,
        }))
}
