//! Handlers for the `/houses` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use roomkeep_core::error::CoreError;
use roomkeep_core::roles::{Role, ROLE_MANAGER};
use roomkeep_core::types::DbId;
use roomkeep_db::models::house::{CreateHouse, House, UpdateHouse};
use roomkeep_db::models::room::{CreateRoom, Room};
use roomkeep_db::repositories::{HouseRepo, RoomRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireStaff};
use crate::response::DataResponse;
use crate::services::scope::{managed_house, visible_house};
use crate::state::AppState;

/// POST /api/v1/houses
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateHouse>,
) -> AppResult<(StatusCode, Json<DataResponse<House>>)> {
    validate_name(&input.name)?;
    ensure_manager(&state, input.manager_id).await?;

    let house = HouseRepo::create(&state.pool, &input).await?;
    tracing::info!(house_id = house.id, user_id = admin.user_id, "House created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: house })))
}

/// GET /api/v1/houses
///
/// Admins see every house, managers the houses assigned to them.
pub async fn list(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<House>>>> {
    let manager_id = (user.role == Role::Manager).then_some(user.user_id);
    let houses = HouseRepo::list(&state.pool, manager_id).await?;
    Ok(Json(DataResponse { data: houses }))
}

/// GET /api/v1/houses/{id}
pub async fn get_by_id(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<House>>> {
    let house = visible_house(&state.pool, &user.acting(), id).await?;
    Ok(Json(DataResponse { data: house }))
}

/// PUT /api/v1/houses/{id}
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateHouse>,
) -> AppResult<Json<DataResponse<House>>> {
    if let Some(name) = &input.name {
        validate_name(name)?;
    }
    ensure_manager(&state, input.manager_id).await?;

    let house = HouseRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::not_found("House", id))?;
    tracing::info!(house_id = id, user_id = admin.user_id, "House updated");
    Ok(Json(DataResponse { data: house }))
}

/// DELETE /api/v1/houses/{id}
///
/// A house with occupied rooms cannot be deleted.
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    HouseRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::not_found("House", id))?;
    if HouseRepo::count_used_rooms(&state.pool, id).await? > 0 {
        return Err(CoreError::Conflict(format!(
            "House {id} has occupied rooms and cannot be deleted"
        ))
        .into());
    }
    if HouseRepo::soft_delete(&state.pool, id).await? {
        tracing::info!(house_id = id, user_id = admin.user_id, "House deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("House", id))
    }
}

/// GET /api/v1/houses/{id}/rooms
pub async fn list_rooms(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Room>>>> {
    visible_house(&state.pool, &user.acting(), id).await?;
    let rooms = RoomRepo::list_by_house(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rooms }))
}

/// POST /api/v1/houses/{id}/rooms
pub async fn create_room(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateRoom>,
) -> AppResult<(StatusCode, Json<DataResponse<Room>>)> {
    managed_house(&state.pool, &user.acting(), id).await?;
    super::room::validate_room_fields(
        Some(input.name.as_str()),
        input.capacity,
        input.base_price,
    )?;

    let room = RoomRepo::create(&state.pool, id, &input).await?;
    tracing::info!(room_id = room.id, house_id = id, user_id = user.user_id, "Room created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: room })))
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_field("name", "Name must not be empty").into());
    }
    Ok(())
}

/// A house manager must be an active user with the manager role.
async fn ensure_manager(state: &AppState, manager_id: Option<DbId>) -> AppResult<()> {
    let Some(manager_id) = manager_id else {
        return Ok(());
    };
    let is_manager = UserRepo::find_by_id(&state.pool, manager_id)
        .await?
        .is_some_and(|u| u.is_active && u.role == ROLE_MANAGER);
    if !is_manager {
        return Err(CoreError::invalid_field(
            "manager_id",
            format!("User {manager_id} is not an active manager"),
        )
        .into());
    }
    Ok(())
}
