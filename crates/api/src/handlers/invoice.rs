//! Handlers for the `/invoices` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use roomkeep_core::types::DbId;
use roomkeep_db::models::invoice::{Invoice, InvoiceFilter, InvoiceWithItems, UpdateInvoice};

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::{DataResponse, MaybeDeleted};
use crate::services::{invoices, payments};
use crate::state::AppState;

/// GET /api/v1/invoices?room_id=&month=&year=&payment_status_id=
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<DataResponse<Vec<Invoice>>>> {
    let invoices = invoices::list(&state.pool, &user.acting(), filter).await?;
    Ok(Json(DataResponse { data: invoices }))
}

/// GET /api/v1/invoices/{id}
pub async fn get_by_id(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<InvoiceWithItems>>> {
    let invoice = invoices::get(&state.pool, &user.acting(), id).await?;
    Ok(Json(DataResponse { data: invoice }))
}

/// PUT /api/v1/invoices/{id}
///
/// Responds with `{ "deleted": true, "id": .. }` when the edit removed the
/// invoice's last item.
pub async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateInvoice>,
) -> AppResult<Json<DataResponse<MaybeDeleted<InvoiceWithItems>>>> {
    let result =
        invoices::update(&state.pool, &state.event_bus, &user.acting(), id, &input).await?;
    Ok(Json(DataResponse { data: result }))
}

/// DELETE /api/v1/invoices/{id}
pub async fn delete(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    invoices::delete(&state.pool, &state.event_bus, &user.acting(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/invoices/{id}/confirm-cash
pub async fn confirm_cash(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<InvoiceWithItems>>> {
    let invoice =
        payments::confirm_cash(&state.pool, &state.event_bus, &user.acting(), id).await?;
    Ok(Json(DataResponse { data: invoice }))
}

/// POST /api/v1/invoices/{id}/reject-cash
pub async fn reject_cash(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<InvoiceWithItems>>> {
    let invoice = payments::reject_cash(&state.pool, &state.event_bus, &user.acting(), id).await?;
    Ok(Json(DataResponse { data: invoice }))
}
