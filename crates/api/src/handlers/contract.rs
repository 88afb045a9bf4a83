//! Handlers for the `/contracts` resource.
//!
//! Every write goes through [`crate::services::contracts`], which keeps the
//! room status in step with the contract's.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use roomkeep_core::types::DbId;
use roomkeep_db::models::contract::{
    ContractFilter, ContractWithTenants, CreateContract, UpdateContract,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::DataResponse;
use crate::services::contracts;
use crate::state::AppState;

/// Request body for `POST /contracts/{id}/terminate`.
#[derive(Debug, Deserialize)]
pub struct TerminateContract {
    pub reason: String,
}

/// POST /api/v1/contracts
pub async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<CreateContract>,
) -> AppResult<(StatusCode, Json<DataResponse<ContractWithTenants>>)> {
    let contract =
        contracts::create(&state.pool, &state.event_bus, &user.acting(), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: contract })))
}

/// GET /api/v1/contracts
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<ContractFilter>,
) -> AppResult<Json<DataResponse<Vec<ContractWithTenants>>>> {
    let contracts = contracts::list(&state.pool, &user.acting(), filter).await?;
    Ok(Json(DataResponse { data: contracts }))
}

/// GET /api/v1/contracts/{id}
pub async fn get_by_id(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ContractWithTenants>>> {
    let contract = contracts::get(&state.pool, &user.acting(), id).await?;
    Ok(Json(DataResponse { data: contract }))
}

/// PUT /api/v1/contracts/{id}
pub async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateContract>,
) -> AppResult<Json<DataResponse<ContractWithTenants>>> {
    let contract =
        contracts::update(&state.pool, &state.event_bus, &user.acting(), id, &input).await?;
    Ok(Json(DataResponse { data: contract }))
}

/// POST /api/v1/contracts/{id}/terminate
pub async fn terminate(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<TerminateContract>,
) -> AppResult<Json<DataResponse<ContractWithTenants>>> {
    let contract =
        contracts::terminate(&state.pool, &state.event_bus, &user.acting(), id, &input.reason)
            .await?;
    Ok(Json(DataResponse { data: contract }))
}

/// DELETE /api/v1/contracts/{id}
pub async fn delete(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    contracts::delete(&state.pool, &user.acting(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
