//! Payment reconciliation.
//!
//! Gateway payments are settled only on the gateway's word: `verify` asks the
//! gateway for the order status and `webhook` accepts a signed push. Both end
//! in [`settle`], which marks the order's unsettled invoices completed in one
//! transaction and is a no-op on replay.
//!
//! Cash payments are separate: a tenant reports one (`waiting`) and staff
//! confirm or reject it.

use std::collections::BTreeSet;

use chrono::Utc;
use roomkeep_core::error::CoreError;
use roomkeep_core::notifications::{
    EVENT_CASH_CONFIRMED, EVENT_CASH_REJECTED, EVENT_CASH_REPORTED, EVENT_INVOICE_PAID,
};
use roomkeep_core::payment::{
    ensure_payable, ensure_waiting, order_code_at, order_code_of, transaction_code_for,
    PaymentResult,
    PAYMENT_METHOD_CASH, PAYMENT_METHOD_GATEWAY,
};
use roomkeep_core::roles::ActingUser;
use roomkeep_core::status::PaymentStatus;
use roomkeep_core::types::{DbId, Money};
use roomkeep_db::models::invoice::{Invoice, InvoiceWithItems};
use roomkeep_db::repositories::InvoiceRepo;
use roomkeep_events::{EventBus, PlatformEvent};
use roomkeep_gateway::{
    verify_webhook, GatewayConfig, GatewayError, PaymentGateway, PaymentOrder, WebhookPayload,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::scope::{managed_room, payment_status, visible_room};
use crate::services::usage::load_with_items;

/// Request body for `POST /payments/checkout` and `POST /payments/cash`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSelection {
    pub invoice_ids: Vec<DbId>,
}

/// Request body for `POST /payments/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPayment {
    pub order_code: i64,
}

/// An opened gateway order.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub order_code: i64,
    pub transaction_code: String,
    pub checkout_url: String,
    pub qr_code: Option<String>,
    pub amount: Money,
    pub invoice_ids: Vec<DbId>,
}

/// Open a gateway order covering `invoice_ids`.
///
/// The invoices are tagged with the order's transaction code and the gateway
/// is called inside the same transaction; a gateway failure rolls the tags
/// back. Invoices still held by an earlier open order are a conflict.
pub async fn checkout(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    gateway_config: Option<&GatewayConfig>,
    actor: &ActingUser,
    input: &InvoiceSelection,
) -> AppResult<CheckoutSession> {
    let ids = selection_ids(&input.invoice_ids)?;

    let mut tx = pool.begin().await?;
    let invoices = lock_selection(&mut *tx, &ids).await?;
    let room_id = single_room(&invoices)?;
    visible_room(pool, actor, room_id, "Invoice", ids[0]).await?;
    for invoice in &invoices {
        ensure_payable(invoice.id, payment_status(invoice.payment_status_id)?)?;
    }
    ensure_no_open_order(gateway, &invoices).await?;

    let amount: Money = invoices.iter().map(|i| i.total_amount).sum();
    if amount <= 0 {
        return Err(CoreError::Validation(
            "Selected invoices have nothing to pay".to_string(),
        )
        .into());
    }

    let order_code = order_code_at(Utc::now());
    let transaction_code = transaction_code_for(order_code);
    InvoiceRepo::attach_transaction(&mut *tx, &ids, &transaction_code, PAYMENT_METHOD_GATEWAY)
        .await?;

    let order = PaymentOrder {
        order_code,
        amount,
        description: transaction_code.clone(),
        return_url: gateway_config.map(|c| c.return_url.clone()).unwrap_or_default(),
        cancel_url: gateway_config.map(|c| c.cancel_url.clone()).unwrap_or_default(),
    };
    let link = match gateway.create_payment_order(&order).await {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(error = %e, order_code, room_id, "Gateway rejected checkout");
            tx.rollback().await?;
            return Err(e.into());
        }
    };

    tx.commit().await?;

    tracing::info!(
        order_code,
        room_id,
        amount,
        invoice_count = ids.len(),
        user_id = actor.user_id,
        "Checkout opened",
    );

    Ok(CheckoutSession {
        order_code,
        transaction_code,
        checkout_url: link.checkout_url,
        qr_code: link.qr_code,
        amount,
        invoice_ids: ids,
    })
}

/// Ask the gateway for the order's status and settle it if paid.
///
/// Gateway failures and unpaid orders come back as a `FAILED` result.
pub async fn verify(
    pool: &PgPool,
    bus: &EventBus,
    gateway: &dyn PaymentGateway,
    order_code: i64,
) -> PaymentResult {
    match gateway.get_payment_status(order_code).await {
        Ok(status) if status.is_paid() => settle(pool, bus, order_code).await,
        Ok(status) => {
            tracing::info!(order_code, status = ?status, "Order not paid");
            PaymentResult::failed(order_code, format!("Order is not paid ({status:?})"))
        }
        Err(e) => {
            tracing::warn!(error = %e, order_code, "Payment status lookup failed");
            PaymentResult::failed(order_code, "Could not confirm payment with the gateway")
        }
    }
}

/// Handle a signed push from the gateway.
///
/// A bad signature is an error; an unpaid order is a `FAILED` result.
pub async fn webhook(
    pool: &PgPool,
    bus: &EventBus,
    gateway_config: Option<&GatewayConfig>,
    payload: &WebhookPayload,
) -> AppResult<PaymentResult> {
    let config = gateway_config.ok_or(GatewayError::NotConfigured)?;
    let data = verify_webhook(&config.checksum_key, payload)?;

    if !data.is_paid() {
        tracing::info!(
            order_code = data.order_code,
            code = %data.code,
            "Webhook reports unpaid order",
        );
        return Ok(PaymentResult::failed(
            data.order_code,
            format!("Order is not paid ({}): {}", data.code, data.desc),
        ));
    }
    Ok(settle(pool, bus, data.order_code).await)
}

/// Mark every unsettled invoice of `order_code` completed.
///
/// Runs in one transaction. Invoices already completed are skipped, so a
/// replay reports `nothing_to_update`. A database failure rolls everything
/// back and is reported as `FAILED`.
pub async fn settle(pool: &PgPool, bus: &EventBus, order_code: i64) -> PaymentResult {
    match settle_once(pool, order_code).await {
        Ok(None) => {
            tracing::info!(order_code, "Order already settled");
            PaymentResult::nothing_to_update(order_code)
        }
        Ok(Some((ids, room_id))) => {
            tracing::info!(order_code, room_id, invoice_ids = ?ids, "Order settled");
            for id in &ids {
                bus.publish(
                    PlatformEvent::new(EVENT_INVOICE_PAID)
                        .with_source("invoice", *id)
                        .with_room(room_id)
                        .with_payload(serde_json::json!({ "order_code": order_code })),
                );
            }
            PaymentResult::settled(order_code, ids, Some(room_id))
        }
        Err(e) => {
            tracing::error!(error = %e, order_code, "Failed to settle order");
            PaymentResult::failed(order_code, "Payment could not be recorded")
        }
    }
}

async fn settle_once(pool: &PgPool, order_code: i64) -> AppResult<Option<(Vec<DbId>, DbId)>> {
    let mut tx = pool.begin().await?;
    let invoices =
        InvoiceRepo::lock_unsettled_by_transaction_code(&mut *tx, &transaction_code_for(order_code))
            .await?;
    let Some(first) = invoices.first() else {
        return Ok(None);
    };
    let room_id = first.room_id;
    let ids: Vec<DbId> = invoices.iter().map(|i| i.id).collect();
    let updated = InvoiceRepo::mark_completed(&mut *tx, &ids).await?;
    tx.commit().await?;

    if updated.is_empty() {
        return Ok(None);
    }
    Ok(Some((updated, room_id)))
}

/// Report invoices as paid in cash; they wait for staff confirmation.
pub async fn report_cash(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    input: &InvoiceSelection,
) -> AppResult<Vec<DbId>> {
    let ids = selection_ids(&input.invoice_ids)?;

    let mut tx = pool.begin().await?;
    let invoices = lock_selection(&mut *tx, &ids).await?;
    let room_id = single_room(&invoices)?;
    visible_room(pool, actor, room_id, "Invoice", ids[0]).await?;
    for invoice in &invoices {
        ensure_payable(invoice.id, payment_status(invoice.payment_status_id)?)?;
    }
    InvoiceRepo::set_payment_status(&mut *tx, &ids, PaymentStatus::Waiting, Some(PAYMENT_METHOD_CASH))
        .await?;
    tx.commit().await?;

    tracing::info!(room_id, invoice_ids = ?ids, user_id = actor.user_id, "Cash payment reported");
    for id in &ids {
        bus.publish(cash_event(EVENT_CASH_REPORTED, *id, room_id, actor));
    }
    Ok(ids)
}

/// Confirm a reported cash payment.
pub async fn confirm_cash(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    id: DbId,
) -> AppResult<InvoiceWithItems> {
    let (mut tx, invoice) = lock_waiting(pool, actor, id).await?;
    InvoiceRepo::mark_completed(&mut *tx, &[id]).await?;
    let confirmed = load_with_items(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(
        invoice_id = id,
        room_id = invoice.room_id,
        user_id = actor.user_id,
        "Cash payment confirmed",
    );
    bus.publish(cash_event(EVENT_CASH_CONFIRMED, id, invoice.room_id, actor));
    Ok(confirmed)
}

/// Reject a reported cash payment; the invoice is payable again.
pub async fn reject_cash(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    id: DbId,
) -> AppResult<InvoiceWithItems> {
    let (mut tx, invoice) = lock_waiting(pool, actor, id).await?;
    InvoiceRepo::set_payment_status(&mut *tx, &[id], PaymentStatus::Pending, None).await?;
    let rejected = load_with_items(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(
        invoice_id = id,
        room_id = invoice.room_id,
        user_id = actor.user_id,
        "Cash payment rejected",
    );
    bus.publish(cash_event(EVENT_CASH_REJECTED, id, invoice.room_id, actor));
    Ok(rejected)
}

async fn lock_waiting(
    pool: &PgPool,
    actor: &ActingUser,
    id: DbId,
) -> AppResult<(sqlx::Transaction<'static, sqlx::Postgres>, Invoice)> {
    let existing = InvoiceRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    managed_room(pool, actor, existing.room_id, "Invoice", id).await?;

    let mut tx = pool.begin().await?;
    let invoice = InvoiceRepo::lock(&mut *tx, id)
        .await?
        .ok_or(AppError::not_found("Invoice", id))?;
    ensure_waiting(id, payment_status(invoice.payment_status_id)?)?;
    Ok((tx, invoice))
}

/// Refuse invoices whose earlier gateway order can still be paid.
async fn ensure_no_open_order(gateway: &dyn PaymentGateway, invoices: &[Invoice]) -> AppResult<()> {
    let earlier: BTreeSet<i64> = invoices
        .iter()
        .filter_map(|i| i.transaction_code.as_deref())
        .filter_map(order_code_of)
        .collect();
    for order_code in earlier {
        let status = gateway.get_payment_status(order_code).await?;
        if status.holds_invoices() {
            return Err(CoreError::Conflict(format!(
                "Order {order_code} is still open for these invoices ({status:?})"
            ))
            .into());
        }
    }
    Ok(())
}

fn selection_ids(raw: &[DbId]) -> AppResult<Vec<DbId>> {
    let ids: Vec<DbId> = raw.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Err(CoreError::invalid_field("invoice_ids", "Select at least one invoice").into());
    }
    Ok(ids)
}

async fn lock_selection(conn: &mut PgConnection, ids: &[DbId]) -> AppResult<Vec<Invoice>> {
    let invoices = InvoiceRepo::lock_many(conn, ids).await?;
    if let Some(missing) = ids.iter().find(|id| !invoices.iter().any(|i| i.id == **id)) {
        return Err(AppError::not_found("Invoice", *missing));
    }
    Ok(invoices)
}

fn single_room(invoices: &[Invoice]) -> AppResult<DbId> {
    let rooms: BTreeSet<DbId> = invoices.iter().map(|i| i.room_id).collect();
    match rooms.len() {
        1 => Ok(invoices[0].room_id),
        _ => Err(CoreError::invalid_field(
            "invoice_ids",
            "All invoices must belong to the same room",
        )
        .into()),
    }
}

fn cash_event(event_type: &str, invoice_id: DbId, room_id: DbId, actor: &ActingUser) -> PlatformEvent {
    PlatformEvent::new(event_type)
        .with_source("invoice", invoice_id)
        .with_room(room_id)
        .with_actor(actor.user_id)
}
