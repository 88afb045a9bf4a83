//! Contract lifecycle service.
//!
//! Every write locks the room row first and then the contract, so two
//! requests touching the same room serialise. Activation closes the other
//! active contracts of the room *before* the new one is marked active: the
//! partial unique index `uq_contracts_room_id_active` is checked per
//! statement.

use std::collections::HashMap;

use chrono::NaiveDate;
use roomkeep_core::contract::{
    expiry_reason, is_closed, resolve_renewal_months, room_sync_for, superseded_reason,
    sweep_action, validate_deposit_status, validate_initial_status, validate_terms,
    validate_transition, RoomSync, SweepAction, DEPOSIT_UNPAID,
};
use roomkeep_core::error::CoreError;
use roomkeep_core::notifications::{
    EVENT_CONTRACT_ACTIVATED, EVENT_CONTRACT_CREATED, EVENT_CONTRACT_EXPIRED,
    EVENT_CONTRACT_RENEWED, EVENT_CONTRACT_TERMINATED,
};
use roomkeep_core::roles::{ActingUser, Role, ROLE_TENANT};
use roomkeep_core::status::{ContractStatus, RoomStatus};
use roomkeep_core::types::DbId;
use roomkeep_db::models::contract::{
    Contract, ContractChanges, ContractFilter, ContractWithTenants, CreateContract, NewContract,
    UpdateContract,
};
use roomkeep_db::repositories::{ContractRepo, RoomRepo, UserRepo};
use roomkeep_events::{EventBus, PlatformEvent};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::scope::{contract_status, managed_room, room_status, visible_room};

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Create a contract, occupying the room when it starts out active.
pub async fn create(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    input: &CreateContract,
) -> AppResult<ContractWithTenants> {
    let status = match &input.status {
        Some(raw) => parse_status(raw)?,
        None => ContractStatus::Draft,
    };
    validate_initial_status(status)?;

    let deposit_amount = input.deposit_amount.unwrap_or(0);
    validate_terms(
        input.start_date,
        input.end_date,
        input.monthly_price,
        deposit_amount,
    )?;
    let deposit_status = input
        .deposit_status
        .clone()
        .unwrap_or_else(|| DEPOSIT_UNPAID.to_string());
    validate_deposit_status(&deposit_status)?;
    let auto_renew = input.auto_renew.unwrap_or(false);
    let time_renew =
        resolve_renewal_months(auto_renew, input.time_renew, input.start_date, input.end_date)?;

    managed_room(pool, actor, input.room_id, "Room", input.room_id).await?;
    let tenant_ids = validate_tenants(pool, &input.tenant_ids).await?;

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, input.room_id)
        .await?
        .ok_or(AppError::not_found("Room", input.room_id))?;

    // Inserted as draft; activation goes through the same path as updates.
    let draft = ContractRepo::insert(
        &mut *tx,
        &NewContract {
            room_id: input.room_id,
            start_date: input.start_date,
            end_date: input.end_date,
            monthly_price: input.monthly_price,
            deposit_amount,
            deposit_status,
            status_id: ContractStatus::Draft.id(),
            auto_renew,
            time_renew,
            notes: input.notes.clone(),
            created_by: actor.user_id,
        },
    )
    .await?;
    ContractRepo::set_tenants(&mut *tx, draft.id, &tenant_ids).await?;

    let (contract, superseded) = if status == ContractStatus::Active {
        let mut changes = changes_of(&draft, actor.user_id);
        changes.status_id = ContractStatus::Active.id();
        write_with_room_sync(&mut *tx, actor, &draft, ContractStatus::Draft, &changes).await?
    } else {
        (draft, Vec::new())
    };

    tx.commit().await?;

    tracing::info!(
        contract_id = contract.id,
        room_id = contract.room_id,
        status = status.name(),
        superseded = superseded.len(),
        user_id = actor.user_id,
        "Contract created",
    );

    bus.publish(contract_event(EVENT_CONTRACT_CREATED, &contract, Some(actor.user_id)));
    if status == ContractStatus::Active {
        bus.publish(contract_event(EVENT_CONTRACT_ACTIVATED, &contract, Some(actor.user_id)));
    }
    for closed in &superseded {
        bus.publish(contract_event(EVENT_CONTRACT_EXPIRED, closed, Some(actor.user_id)));
    }

    Ok(ContractWithTenants::new(contract, tenant_ids))
}

// ---------------------------------------------------------------------------
// Update / terminate / delete
// ---------------------------------------------------------------------------

/// Update a contract and apply the room synchronisation its status change
/// requires.
pub async fn update(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    id: DbId,
    input: &UpdateContract,
) -> AppResult<ContractWithTenants> {
    let existing = ContractRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;
    managed_room(pool, actor, existing.room_id, "Contract", id).await?;
    let new_tenants = match &input.tenant_ids {
        Some(ids) => Some(validate_tenants(pool, ids).await?),
        None => None,
    };

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, existing.room_id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;
    let current = ContractRepo::lock(&mut *tx, id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;

    let from = contract_status(current.status_id)?;
    let to = match &input.status {
        Some(raw) => parse_status(raw)?,
        None => from,
    };
    validate_transition(from, to)?;
    let changes = merge_changes(&current, input, to, actor.user_id)?;

    let (contract, superseded) =
        write_with_room_sync(&mut *tx, actor, &current, from, &changes).await?;

    if let Some(tenants) = &new_tenants {
        ContractRepo::set_tenants(&mut *tx, id, tenants).await?;
    }
    let tenant_ids = ContractRepo::tenant_ids(&mut *tx, id).await?;

    tx.commit().await?;

    tracing::info!(
        contract_id = id,
        room_id = contract.room_id,
        from = from.name(),
        to = to.name(),
        user_id = actor.user_id,
        "Contract updated",
    );

    if from != to {
        let event_type = match to {
            ContractStatus::Active => Some(EVENT_CONTRACT_ACTIVATED),
            ContractStatus::Terminated => Some(EVENT_CONTRACT_TERMINATED),
            ContractStatus::Expired => Some(EVENT_CONTRACT_EXPIRED),
            ContractStatus::Draft => None,
        };
        if let Some(event_type) = event_type {
            bus.publish(contract_event(event_type, &contract, Some(actor.user_id)));
        }
    }
    for closed in &superseded {
        bus.publish(contract_event(EVENT_CONTRACT_EXPIRED, closed, Some(actor.user_id)));
    }

    Ok(ContractWithTenants::new(contract, tenant_ids))
}

/// Force a contract into `terminated` with a reason.
pub async fn terminate(
    pool: &PgPool,
    bus: &EventBus,
    actor: &ActingUser,
    id: DbId,
    reason: &str,
) -> AppResult<ContractWithTenants> {
    if reason.trim().is_empty() {
        return Err(CoreError::invalid_field("reason", "A termination reason is required").into());
    }
    let input = UpdateContract {
        status: Some(ContractStatus::Terminated.name().to_string()),
        termination_reason: Some(reason.trim().to_string()),
        ..Default::default()
    };
    update(pool, bus, actor, id, &input).await
}

/// Soft-delete a contract. Deleting the active contract releases the room
/// unless another active contract remains.
pub async fn delete(pool: &PgPool, actor: &ActingUser, id: DbId) -> AppResult<()> {
    let existing = ContractRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;
    managed_room(pool, actor, existing.room_id, "Contract", id).await?;

    let mut tx = pool.begin().await?;
    RoomRepo::lock(&mut *tx, existing.room_id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;
    let current = ContractRepo::lock(&mut *tx, id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;

    ContractRepo::soft_delete(&mut *tx, id, actor.user_id).await?;
    let from = contract_status(current.status_id)?;
    let released = match room_sync_for(Some(from), None) {
        RoomSync::ReleaseIfVacant => release_if_vacant(&mut *tx, current.room_id, Some(id)).await?,
        _ => false,
    };

    tx.commit().await?;

    tracing::info!(
        contract_id = id,
        room_id = current.room_id,
        released,
        user_id = actor.user_id,
        "Contract deleted",
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// A contract the actor may read.
pub async fn get(pool: &PgPool, actor: &ActingUser, id: DbId) -> AppResult<ContractWithTenants> {
    let contract = ContractRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::not_found("Contract", id))?;
    let tenant_ids = ContractRepo::tenant_ids(pool, id).await?;

    if actor.role == Role::Tenant {
        if !tenant_ids.contains(&actor.user_id) {
            return Err(AppError::not_found("Contract", id));
        }
    } else {
        visible_room(pool, actor, contract.room_id, "Contract", id).await?;
    }

    Ok(ContractWithTenants::new(contract, tenant_ids))
}

/// Contracts visible to the actor, narrowed by `filter`.
pub async fn list(
    pool: &PgPool,
    actor: &ActingUser,
    mut filter: ContractFilter,
) -> AppResult<Vec<ContractWithTenants>> {
    match actor.role {
        Role::Admin => {}
        Role::Manager => filter.manager_id = Some(actor.user_id),
        Role::Tenant => filter.tenant_id = Some(actor.user_id),
    }

    let contracts = ContractRepo::list(pool, &filter).await?;
    let ids: Vec<DbId> = contracts.iter().map(|c| c.id).collect();
    let mut tenants: HashMap<DbId, Vec<DbId>> = HashMap::new();
    for (contract_id, user_id) in ContractRepo::tenant_pairs(pool, &ids).await? {
        tenants.entry(contract_id).or_default().push(user_id);
    }

    Ok(contracts
        .into_iter()
        .map(|contract| {
            let tenant_ids = tenants.remove(&contract.id).unwrap_or_default();
            ContractWithTenants::new(contract, tenant_ids)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Daily sweep
// ---------------------------------------------------------------------------

/// Counts reported by one sweep run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub renewed: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Renew or expire every active contract whose end date is before `today`.
///
/// Each contract is handled in its own transaction; a failure is logged and
/// counted and the sweep moves on.
pub async fn sweep_overdue(pool: &PgPool, bus: &EventBus, today: NaiveDate) -> AppResult<SweepReport> {
    let overdue = ContractRepo::list_overdue_active(pool, today).await?;
    let mut report = SweepReport::default();

    for contract in &overdue {
        match sweep_one(pool, contract, today).await {
            Ok(Some((SweepAction::Renew { new_end_date }, renewed))) => {
                report.renewed += 1;
                tracing::info!(
                    contract_id = renewed.id,
                    room_id = renewed.room_id,
                    %new_end_date,
                    "Contract renewed",
                );
                bus.publish(contract_event(EVENT_CONTRACT_RENEWED, &renewed, None));
            }
            Ok(Some((SweepAction::Expire, expired))) => {
                report.expired += 1;
                tracing::info!(
                    contract_id = expired.id,
                    room_id = expired.room_id,
                    "Contract expired",
                );
                bus.publish(contract_event(EVENT_CONTRACT_EXPIRED, &expired, None));
            }
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    error = %e,
                    contract_id = contract.id,
                    room_id = contract.room_id,
                    "Contract sweep failed",
                );
            }
        }
    }

    Ok(report)
}

async fn sweep_one(
    pool: &PgPool,
    contract: &Contract,
    today: NaiveDate,
) -> AppResult<Option<(SweepAction, Contract)>> {
    let mut tx = pool.begin().await?;
    if RoomRepo::lock(&mut *tx, contract.room_id).await?.is_none() {
        return Ok(None);
    }
    let Some(current) = ContractRepo::lock(&mut *tx, contract.id).await? else {
        return Ok(None);
    };
    if current.status_id != ContractStatus::Active.id() {
        return Ok(None);
    }
    let Some(action) = sweep_action(current.end_date, current.auto_renew, current.time_renew, today)
    else {
        return Ok(None);
    };

    let updated = match action {
        SweepAction::Renew { new_end_date } => {
            ContractRepo::renew(&mut *tx, current.id, new_end_date).await?
        }
        SweepAction::Expire => {
            let closed = ContractRepo::close(
                &mut *tx,
                current.id,
                ContractStatus::Expired,
                &expiry_reason(current.end_date),
            )
            .await?;
            if closed.is_some() {
                release_if_vacant(&mut *tx, current.room_id, Some(current.id)).await?;
            }
            closed
        }
    };

    tx.commit().await?;
    Ok(updated.map(|c| (action, c)))
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

/// Write `changes` to `current` and apply the room effect of moving from
/// `from` to the new status. Returns the written contract and the contracts
/// it superseded.
async fn write_with_room_sync(
    conn: &mut PgConnection,
    actor: &ActingUser,
    current: &Contract,
    from: ContractStatus,
    changes: &ContractChanges,
) -> AppResult<(Contract, Vec<Contract>)> {
    let to = contract_status(changes.status_id)?;

    match room_sync_for(Some(from), Some(to)) {
        RoomSync::Occupy => {
            let superseded = ContractRepo::close_active_for_room(
                &mut *conn,
                current.room_id,
                Some(current.id),
                ContractStatus::Expired,
                &superseded_reason(current.id),
                Some(actor.user_id),
            )
            .await?;
            let contract = ContractRepo::update(&mut *conn, current.id, changes).await?;
            RoomRepo::set_status(&mut *conn, current.room_id, RoomStatus::Used.id()).await?;
            Ok((contract, superseded))
        }
        RoomSync::ReleaseIfVacant => {
            let contract = ContractRepo::update(&mut *conn, current.id, changes).await?;
            release_if_vacant(&mut *conn, current.room_id, Some(current.id)).await?;
            Ok((contract, Vec::new()))
        }
        RoomSync::Unchanged => {
            let contract = ContractRepo::update(&mut *conn, current.id, changes).await?;
            Ok((contract, Vec::new()))
        }
    }
}

/// Make a `used` room `available` when no active contract other than
/// `exclude_id` remains. Returns whether the room was released.
pub(crate) async fn release_if_vacant(
    conn: &mut PgConnection,
    room_id: DbId,
    exclude_id: Option<DbId>,
) -> AppResult<bool> {
    if ContractRepo::count_active_for_room(&mut *conn, room_id, exclude_id).await? > 0 {
        return Ok(false);
    }
    let Some(room) = RoomRepo::lock(&mut *conn, room_id).await? else {
        return Ok(false);
    };
    if room_status(room.status_id)? != RoomStatus::Used {
        return Ok(false);
    }
    RoomRepo::set_status(&mut *conn, room_id, RoomStatus::Available.id()).await?;
    Ok(true)
}

/// The full field set of a contract, as a starting point for a rewrite.
fn changes_of(contract: &Contract, updated_by: DbId) -> ContractChanges {
    ContractChanges {
        start_date: contract.start_date,
        end_date: contract.end_date,
        monthly_price: contract.monthly_price,
        deposit_amount: contract.deposit_amount,
        deposit_status: contract.deposit_status.clone(),
        status_id: contract.status_id,
        auto_renew: contract.auto_renew,
        time_renew: contract.time_renew,
        termination_reason: contract.termination_reason.clone(),
        notes: contract.notes.clone(),
        updated_by,
    }
}

/// Merge an update request over the current row and validate the result.
fn merge_changes(
    current: &Contract,
    input: &UpdateContract,
    to: ContractStatus,
    updated_by: DbId,
) -> Result<ContractChanges, CoreError> {
    let mut changes = changes_of(current, updated_by);
    changes.status_id = to.id();

    if let Some(start) = input.start_date {
        changes.start_date = start;
    }
    if let Some(end) = input.end_date {
        changes.end_date = end;
    }
    if let Some(price) = input.monthly_price {
        changes.monthly_price = price;
    }
    if let Some(deposit) = input.deposit_amount {
        changes.deposit_amount = deposit;
    }
    validate_terms(
        changes.start_date,
        changes.end_date,
        changes.monthly_price,
        changes.deposit_amount,
    )?;

    if let Some(deposit_status) = &input.deposit_status {
        validate_deposit_status(deposit_status)?;
        changes.deposit_status = deposit_status.clone();
    }

    if let Some(auto_renew) = input.auto_renew {
        changes.auto_renew = auto_renew;
    }
    changes.time_renew = resolve_renewal_months(
        changes.auto_renew,
        input.time_renew.or(current.time_renew),
        changes.start_date,
        changes.end_date,
    )?;

    if let Some(notes) = &input.notes {
        changes.notes = Some(notes.clone());
    }
    if let Some(reason) = &input.termination_reason {
        changes.termination_reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
    }
    if to == ContractStatus::Terminated && changes.termination_reason.is_none() {
        return Err(CoreError::invalid_field(
            "termination_reason",
            "A termination reason is required to terminate a contract",
        ));
    }

    Ok(changes)
}

/// Validate a tenant list: non-empty, existing active users with the tenant
/// role. Returns the ids sorted and deduplicated.
async fn validate_tenants(pool: &PgPool, ids: &[DbId]) -> AppResult<Vec<DbId>> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(CoreError::invalid_field("tenant_ids", "At least one tenant is required").into());
    }

    let users = UserRepo::find_many(pool, &ids).await?;
    for id in &ids {
        match users.iter().find(|u| u.id == *id) {
            Some(user) if user.is_active && user.role == ROLE_TENANT => {}
            Some(_) => {
                return Err(CoreError::invalid_field(
                    "tenant_ids",
                    format!("User {id} is not an active tenant"),
                )
                .into())
            }
            None => {
                return Err(CoreError::invalid_field(
                    "tenant_ids",
                    format!("User {id} does not exist"),
                )
                .into())
            }
        }
    }
    Ok(ids)
}

fn parse_status(raw: &str) -> Result<ContractStatus, CoreError> {
    ContractStatus::from_name(raw).ok_or_else(|| {
        CoreError::invalid_field("status", format!("Unknown contract status '{raw}'"))
    })
}

fn contract_event(event_type: &str, contract: &Contract, actor: Option<DbId>) -> PlatformEvent {
    let status = ContractStatus::from_id(contract.status_id);
    let mut event = PlatformEvent::new(event_type)
        .with_source("contract", contract.id)
        .with_room(contract.room_id)
        .with_payload(serde_json::json!({
            "status": status.map(|s| s.name()),
            "end_date": contract.end_date,
            "termination_reason": contract.termination_reason,
            "closed": status.is_some_and(is_closed),
        }));
    if let Some(actor) = actor {
        event = event.with_actor(actor);
    }
    event
}
