//! Handlers for the `/services` catalog.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use roomkeep_core::error::CoreError;
use roomkeep_core::types::DbId;
use roomkeep_db::models::service::{CreateService, Service, UpdateService};
use roomkeep_db::repositories::ServiceRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/services
pub async fn list(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Service>>>> {
    let services = ServiceRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: services }))
}

/// POST /api/v1/services
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateService>,
) -> AppResult<(StatusCode, Json<DataResponse<Service>>)> {
    if input.name.trim().is_empty() {
        return Err(CoreError::invalid_field("name", "Name must not be empty").into());
    }
    if input.unit.trim().is_empty() {
        return Err(CoreError::invalid_field("unit", "Unit must not be empty").into());
    }
    validate_default_price(input.default_price)?;

    let service = ServiceRepo::create(&state.pool, &input).await?;
    tracing::info!(service_id = service.id, user_id = admin.user_id, "Service created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: service })))
}

/// PUT /api/v1/services/{id}
pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateService>,
) -> AppResult<Json<DataResponse<Service>>> {
    validate_default_price(input.default_price)?;
    let service = ServiceRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::not_found("Service", id))?;
    Ok(Json(DataResponse { data: service }))
}

fn validate_default_price(price: Option<i64>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(
            CoreError::invalid_field("default_price", "Default price must not be negative").into(),
        );
    }
    Ok(())
}
