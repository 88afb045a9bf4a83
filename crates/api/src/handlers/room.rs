//! Handlers for the `/rooms` resource and its sub-resources: status,
//! service bindings, monthly service usage and custom invoices.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use roomkeep_core::error::CoreError;
use roomkeep_core::status::RoomStatus;
use roomkeep_core::types::{DbId, Money};
use roomkeep_db::models::invoice::{CreateInvoice, InvoiceWithItems};
use roomkeep_db::models::room::{Room, UpdateRoom};
use roomkeep_db::models::service::{CreateRoomService, RoomService, UpdateRoomService};
use roomkeep_db::repositories::{RoomRepo, RoomServiceRepo, ServiceRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::query::PeriodParams;
use crate::response::DataResponse;
use crate::services::rooms::RoomStatusChange;
use crate::services::scope::{managed_room, visible_room};
use crate::services::usage::{SaveServiceUsage, UsageReconciliation, UsageView};
use crate::services::{invoices, rooms, usage};
use crate::state::AppState;

/// Request body for `PUT /rooms/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct ChangeRoomStatus {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Room CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms/{id}
pub async fn get_by_id(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Room>>> {
    visible_room(&state.pool, &user.acting(), id, "Room", id).await?;
    let room = RoomRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::not_found("Room", id))?;
    Ok(Json(DataResponse { data: room }))
}

/// PUT /api/v1/rooms/{id}
pub async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRoom>,
) -> AppResult<Json<DataResponse<Room>>> {
    managed_room(&state.pool, &user.acting(), id, "Room", id).await?;
    validate_room_fields(input.name.as_deref(), input.capacity, input.base_price)?;

    let room = RoomRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::not_found("Room", id))?;
    Ok(Json(DataResponse { data: room }))
}

/// DELETE /api/v1/rooms/{id}
pub async fn delete(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    rooms::delete(&state.pool, &user.acting(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/rooms/{id}/status
///
/// Closes the room's active contracts when leaving `used`. Cascade failures
/// are returned as `warnings`; the status change itself stands.
pub async fn change_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ChangeRoomStatus>,
) -> AppResult<Json<DataResponse<RoomStatusChange>>> {
    let to = RoomStatus::from_name(&input.status).ok_or_else(|| {
        CoreError::invalid_field("status", format!("Unknown room status '{}'", input.status))
    })?;
    let change =
        rooms::change_status(&state.pool, &state.event_bus, &user.acting(), id, to).await?;
    Ok(Json(DataResponse { data: change }))
}

// ---------------------------------------------------------------------------
// Room services
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms/{id}/services
pub async fn list_services(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<RoomService>>>> {
    visible_room(&state.pool, &user.acting(), id, "Room", id).await?;
    let services = RoomServiceRepo::list_by_room(&state.pool, id, false).await?;
    Ok(Json(DataResponse { data: services }))
}

/// POST /api/v1/rooms/{id}/services
pub async fn add_service(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateRoomService>,
) -> AppResult<(StatusCode, Json<DataResponse<RoomService>>)> {
    managed_room(&state.pool, &user.acting(), id, "Room", id).await?;
    validate_price(input.price)?;
    ServiceRepo::find_by_id(&state.pool, input.service_id)
        .await?
        .ok_or_else(|| {
            CoreError::invalid_field(
                "service_id",
                format!("Service {} does not exist", input.service_id),
            )
        })?;

    let binding = RoomServiceRepo::create(&state.pool, id, &input)
        .await?
        .ok_or(AppError::not_found("Room", id))?;
    tracing::info!(
        room_id = id,
        room_service_id = binding.id,
        service_id = input.service_id,
        user_id = user.user_id,
        "Service bound to room",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: binding })))
}

/// PUT /api/v1/rooms/{id}/services/{room_service_id}
pub async fn update_service(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path((id, room_service_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateRoomService>,
) -> AppResult<Json<DataResponse<RoomService>>> {
    managed_binding(&state, &user.acting(), id, room_service_id).await?;
    validate_price(input.price)?;

    let binding = RoomServiceRepo::update(&state.pool, room_service_id, &input)
        .await?
        .ok_or(AppError::not_found("RoomService", room_service_id))?;
    Ok(Json(DataResponse { data: binding }))
}

/// DELETE /api/v1/rooms/{id}/services/{room_service_id}
pub async fn remove_service(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path((id, room_service_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    managed_binding(&state, &user.acting(), id, room_service_id).await?;
    if RoomServiceRepo::soft_delete(&state.pool, room_service_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("RoomService", room_service_id))
    }
}

// ---------------------------------------------------------------------------
// Service usage and invoices
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms/{id}/service-usage?month=&year=
pub async fn get_service_usage(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(period): Query<PeriodParams>,
) -> AppResult<Json<DataResponse<Vec<UsageView>>>> {
    let usage =
        usage::room_service_usage(&state.pool, &user.acting(), id, period.month, period.year)
            .await?;
    Ok(Json(DataResponse { data: usage }))
}

/// POST /api/v1/rooms/{id}/service-usage
///
/// Saves the period's readings and rebuilds the period's service-usage
/// invoice from them.
pub async fn save_service_usage(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SaveServiceUsage>,
) -> AppResult<Json<DataResponse<UsageReconciliation>>> {
    let result =
        usage::save_room_service_usage(&state.pool, &state.event_bus, &user.acting(), id, &input)
            .await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/rooms/{id}/invoices
pub async fn create_invoice(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateInvoice>,
) -> AppResult<(StatusCode, Json<DataResponse<InvoiceWithItems>>)> {
    let invoice =
        invoices::create_custom(&state.pool, &state.event_bus, &user.acting(), id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: invoice })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn validate_room_fields(
    name: Option<&str>,
    capacity: Option<i32>,
    base_price: Option<Money>,
) -> AppResult<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(CoreError::invalid_field("name", "Name must not be empty").into());
    }
    if capacity.is_some_and(|c| c < 1) {
        return Err(CoreError::invalid_field("capacity", "Capacity must be at least 1").into());
    }
    if base_price.is_some_and(|p| p < 0) {
        return Err(
            CoreError::invalid_field("base_price", "Base price must not be negative").into(),
        );
    }
    Ok(())
}

fn validate_price(price: Option<Money>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(CoreError::invalid_field("price", "Price must not be negative").into());
    }
    Ok(())
}

/// Resolve a service binding of a room the actor manages.
async fn managed_binding(
    state: &AppState,
    actor: &roomkeep_core::roles::ActingUser,
    room_id: DbId,
    room_service_id: DbId,
) -> AppResult<RoomService> {
    managed_room(&state.pool, actor, room_id, "Room", room_id).await?;
    RoomServiceRepo::find_by_id(&state.pool, room_service_id)
        .await?
        .filter(|binding| binding.room_id == room_id)
        .ok_or(AppError::not_found("RoomService", room_service_id))
}
