//! Room status changes and the contract cascade they drive.
//!
//! The room update commits first. Closing the room's active contracts runs
//! afterwards in its own transaction and is best effort: a failure there is
//! logged and reported in [`RoomStatusChange::warnings`], never returned as
//! an error, and the room keeps its new status.

use roomkeep_core::contract::{
    cascade_for_room_change, room_change_reason, validate_manual_room_status, ContractCascade,
};
use roomkeep_core::error::CoreError;
use roomkeep_core::notifications::{EVENT_CONTRACT_EXPIRED, EVENT_CONTRACT_TERMINATED};
use roomkeep_core::roles::ActingUser;
use roomkeep_core::status::{ContractStatus, RoomStatus};
use roomkeep_core::types::DbId;
use roomkeep_db::models::contract::Contract;
use roomkeep_db::models::room::Room;
use roomkeep_db::repositories::{ContractRepo, RoomRepo};
use roomkeep_events::{EventBus, PlatformEvent};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::scope::{managed_room, room_status};

/// Outcome of [`change_status`].
#[derive(Debug, Serialize)]
pub struct RoomStatusChange {
    pub room: Room,
    /// Contracts closed by the cascade.
    pub closed_contract_ids: Vec<DbId>,
    /// Cascade failures. The room change itself stood.
    pub warnings: Vec<String>,
}

/// Move a room to `to` and close its active contracts as the new status
/// requires: `available` expires them, `maintenance` terminates them.
pub async fn change_status(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    room_id: DbId,
    to: RoomStatus,
) -> AppResult<RoomStatusChange> {
    validate_manual_room_status(to)?;
    managed_room(pool, actor, room_id, "Room", room_id).await?;

    let mut tx = pool.begin().await?;
    let current = RoomRepo::lock(&mut *tx, room_id)
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;
    let from = room_status(current.status_id)?;
    let room = RoomRepo::set_status(&mut *tx, room_id, to.id())
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;
    tx.commit().await?;

    tracing::info!(
        room_id,
        from = from.name(),
        to = to.name(),
        user_id = actor.user_id,
        "Room status changed",
    );

    let mut change = RoomStatusChange {
        room,
        closed_contract_ids: Vec::new(),
        warnings: Vec::new(),
    };

    let cascade = cascade_for_room_change(from, to);
    if cascade == ContractCascade::None {
        return Ok(change);
    }

    match close_active_contracts(pool, actor, room_id, to, cascade).await {
        Ok(closed) => {
            let event_type = match cascade {
                ContractCascade::ExpireActive => EVENT_CONTRACT_EXPIRED,
                _ => EVENT_CONTRACT_TERMINATED,
            };
            for contract in &closed {
                bus.publish(
                    PlatformEvent::new(event_type)
                        .with_source("contract", contract.id)
                        .with_room(room_id)
                        .with_actor(actor.user_id)
                        .with_payload(serde_json::json!({
                            "termination_reason": contract.termination_reason,
                        })),
                );
            }
            change.closed_contract_ids = closed.iter().map(|c| c.id).collect();
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                room_id,
                to = to.name(),
                "Room status changed but its active contracts could not be closed",
            );
            change.warnings.push(format!(
                "Active contracts of room {room_id} could not be closed: {e}"
            ));
        }
    }

    Ok(change)
}

/// Close the room's active contracts in one transaction.
///
/// Expired contracts are attributed to their creator, terminated ones to the
/// actor.
async fn close_active_contracts(
    pool: &PgPool,
    actor: &ActingUser,
    room_id: DbId,
    to: RoomStatus,
    cascade: ContractCascade,
) -> AppResult<Vec<Contract>> {
    let (status, updated_by) = match cascade {
        ContractCascade::ExpireActive => (ContractStatus::Expired, None),
        ContractCascade::TerminateActive => (ContractStatus::Terminated, Some(actor.user_id)),
        ContractCascade::None => return Ok(Vec::new()),
    };

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, room_id)
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;
    let closed = ContractRepo::close_active_for_room(
        &mut *tx,
        room_id,
        None,
        status,
        &room_change_reason(room_id, to),
        updated_by,
    )
    .await?;
    tx.commit().await?;
    Ok(closed)
}

/// Soft-delete a room. A room with an active contract cannot be deleted.
pub async fn delete(pool: &PgPool, actor: &ActingUser, room_id: DbId) -> AppResult<()> {
    managed_room(pool, actor, room_id, "Room", room_id).await?;

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, room_id)
        .await?
        .ok_or(AppError::not_found("Room", room_id))?;
    if ContractRepo::count_active_for_room(&mut *tx, room_id, None).await? > 0 {
        return Err(CoreError::Conflict(format!(
            "Room {room_id} has an active contract and cannot be deleted"
        ))
        .into());
    }
    RoomRepo::soft_delete(&mut *tx, room_id).await?;
    tx.commit().await?;

    tracing::info!(room_id, user_id = actor.user_id, "Room deleted");
    Ok(())
}
