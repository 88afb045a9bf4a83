//! Handlers for the `/payments` resource.
//!
//! `verify` and `webhook` answer 200 with a `PaymentResult` whose `status`
//! is `FAILED` when the gateway does not confirm the order; only a bad
//! webhook signature or a missing gateway configuration is an error.

use axum::extract::State;
use axum::Json;
use roomkeep_core::payment::PaymentResult;
use roomkeep_core::types::DbId;
use roomkeep_gateway::WebhookPayload;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::services::payments::{self, CheckoutSession, InvoiceSelection, VerifyPayment};
use crate::state::AppState;

/// POST /api/v1/payments/checkout
pub async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<InvoiceSelection>,
) -> AppResult<Json<DataResponse<CheckoutSession>>> {
    let session = payments::checkout(
        &state.pool,
        state.gateway.as_ref(),
        state.config.gateway.as_ref(),
        &user.acting(),
        &input,
    )
    .await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/payments/verify
pub async fn verify(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<VerifyPayment>,
) -> AppResult<Json<DataResponse<PaymentResult>>> {
    tracing::debug!(order_code = input.order_code, user_id = user.user_id, "Verifying payment");
    let result = payments::verify(
        &state.pool,
        &state.event_bus,
        state.gateway.as_ref(),
        input.order_code,
    )
    .await;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/payments/webhook
///
/// Called by the gateway; authenticated by the payload signature only.
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<DataResponse<PaymentResult>>> {
    let result = payments::webhook(
        &state.pool,
        &state.event_bus,
        state.config.gateway.as_ref(),
        &payload,
    )
    .await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/payments/cash
///
/// Marks the invoices as waiting for staff to confirm the cash payment.
pub async fn report_cash(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<InvoiceSelection>,
) -> AppResult<Json<DataResponse<Vec<DbId>>>> {
    let ids = payments::report_cash(&state.pool, &state.event_bus, &user.acting(), &input).await?;
    Ok(Json(DataResponse { data: ids }))
}
