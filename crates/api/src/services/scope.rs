//! Ownership resolution shared by the services and CRUD handlers.

use roomkeep_core::access::{can_view, ensure_manages, ensure_visible};
use roomkeep_core::error::CoreError;
use roomkeep_core::roles::{ActingUser, Role};
use roomkeep_core::status::{ContractStatus, PaymentStatus, RoomStatus, StatusId};
use roomkeep_core::types::DbId;
use roomkeep_db::models::house::House;
use roomkeep_db::models::room::RoomScope;
use roomkeep_db::repositories::{HouseRepo, RoomRepo};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Load a house the actor may manage.
pub async fn managed_house(pool: &PgPool, actor: &ActingUser, house_id: DbId) -> AppResult<House> {
    let house = HouseRepo::find_by_id(pool, house_id)
        .await?
        .ok_or(AppError::not_found("House", house_id))?;
    ensure_manages(actor, house.manager_id, "House", house_id)?;
    Ok(house)
}

/// Load a house the actor may read. Tenants never see houses.
pub async fn visible_house(pool: &PgPool, actor: &ActingUser, house_id: DbId) -> AppResult<House> {
    let house = HouseRepo::find_by_id(pool, house_id)
        .await?
        .ok_or(AppError::not_found("House", house_id))?;
    let visible = actor.role != Role::Tenant && can_view(actor, house.manager_id, &[]);
    ensure_visible(visible, "House", house_id)?;
    Ok(house)
}

/// Resolve a room the actor may write to. `entity`/`id` name the record
/// reported when the room belongs to someone else.
pub async fn managed_room(
    pool: &PgPool,
    actor: &ActingUser,
    room_id: DbId,
    entity: &'static str,
    id: DbId,
) -> AppResult<RoomScope> {
    let scope = RoomRepo::find_scope(pool, room_id)
        .await?
        .ok_or(AppError::not_found(entity, id))?;
    ensure_manages(actor, scope.manager_id, entity, id)?;
    Ok(scope)
}

/// Resolve a room the actor may read: staff of the house, or a tenant on
/// any non-draft contract of the room.
pub async fn visible_room(
    pool: &PgPool,
    actor: &ActingUser,
    room_id: DbId,
    entity: &'static str,
    id: DbId,
) -> AppResult<RoomScope> {
    let scope = RoomRepo::find_scope(pool, room_id)
        .await?
        .ok_or(AppError::not_found(entity, id))?;
    let tenants = if actor.role == Role::Tenant {
        RoomRepo::tenant_ids(pool, room_id, false).await?
    } else {
        Vec::new()
    };
    ensure_visible(can_view(actor, scope.manager_id, &tenants), entity, id)?;
    Ok(scope)
}

/// Map a stored room status id to its enum.
pub fn room_status(id: StatusId) -> AppResult<RoomStatus> {
    RoomStatus::from_id(id)
        .ok_or_else(|| AppError::Core(CoreError::Internal(format!("Unknown room status id {id}"))))
}

/// Map a stored contract status id to its enum.
pub fn contract_status(id: StatusId) -> AppResult<ContractStatus> {
    ContractStatus::from_id(id).ok_or_else(|| {
        AppError::Core(CoreError::Internal(format!("Unknown contract status id {id}")))
    })
}

/// Map a stored payment status id to its enum.
pub fn payment_status(id: StatusId) -> AppResult<PaymentStatus> {
    PaymentStatus::from_id(id).ok_or_else(|| {
        AppError::Core(CoreError::Internal(format!("Unknown payment status id {id}")))
    })
}
