//! Contract lifecycle state machine and room-status synchronisation rules.
//!
//! States: `draft -> active -> {terminated, expired}`. Only `active` counts
//! toward the one-active-contract-per-room invariant. The functions here are
//! pure decision tables; the service layer applies their verdicts inside a
//! transaction.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::CoreError;
use crate::status::{ContractStatus, RoomStatus};
use crate::types::{DbId, Money};

/// Renewal interval used when the contract term does not yield a positive
/// number of months.
pub const DEFAULT_RENEWAL_MONTHS: i32 = 6;

/// Deposit has not been collected yet.
pub const DEPOSIT_UNPAID: &str = "unpaid";
/// Deposit was collected.
pub const DEPOSIT_PAID: &str = "paid";
/// Deposit was returned to the tenant.
pub const DEPOSIT_REFUNDED: &str = "refunded";

/// All valid deposit status values.
pub const VALID_DEPOSIT_STATUSES: &[&str] = &[DEPOSIT_UNPAID, DEPOSIT_PAID, DEPOSIT_REFUNDED];

// ---------------------------------------------------------------------------
// Contract -> room
// ---------------------------------------------------------------------------

/// What a contract status change requires of its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomSync {
    /// Room becomes `used` and every other active contract on it expires.
    Occupy,
    /// Room becomes `available` unless another active contract remains.
    ReleaseIfVacant,
    /// Nothing to do.
    Unchanged,
}

/// Decide the room effect of a contract moving from `from` to `to`.
///
/// `None` on the left means the contract is being created, `None` on the
/// right means it is being deleted.
pub fn room_sync_for(from: Option<ContractStatus>, to: Option<ContractStatus>) -> RoomSync {
    let was_active = from == Some(ContractStatus::Active);
    let is_active = to == Some(ContractStatus::Active);
    match (was_active, is_active) {
        (false, true) => RoomSync::Occupy,
        (true, false) => RoomSync::ReleaseIfVacant,
        _ => RoomSync::Unchanged,
    }
}

/// Whether a contract in this status can no longer change.
pub fn is_closed(status: ContractStatus) -> bool {
    matches!(status, ContractStatus::Terminated | ContractStatus::Expired)
}

/// Validate a requested status change on an existing contract.
pub fn validate_transition(from: ContractStatus, to: ContractStatus) -> Result<(), CoreError> {
    use ContractStatus::*;

    if is_closed(from) {
        return Err(CoreError::Conflict(format!(
            "Contract is {} and can no longer be modified",
            from.name()
        )));
    }

    match (from, to) {
        (Draft, Draft | Active | Terminated) | (Active, Active | Terminated | Expired) => Ok(()),
        _ => Err(CoreError::invalid_field(
            "status",
            format!("Cannot move a contract from {} to {}", from.name(), to.name()),
        )),
    }
}

/// Statuses a contract may be created in.
pub fn validate_initial_status(status: ContractStatus) -> Result<(), CoreError> {
    match status {
        ContractStatus::Draft | ContractStatus::Active => Ok(()),
        other => Err(CoreError::invalid_field(
            "status",
            format!("A contract cannot be created as {}", other.name()),
        )),
    }
}

/// Termination reason written on contracts expired because a newer contract
/// on the same room was activated.
pub fn superseded_reason(new_contract_id: DbId) -> String {
    format!("Superseded by contract #{new_contract_id}")
}

/// Termination reason written by the daily sweep on contracts that ran out.
pub fn expiry_reason(end_date: NaiveDate) -> String {
    format!("Contract ended on {end_date}")
}

// ---------------------------------------------------------------------------
// Room -> contract
// ---------------------------------------------------------------------------

/// What a room status change requires of the room's active contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractCascade {
    /// Active contracts become `expired`.
    ExpireActive,
    /// Active contracts become `terminated`.
    TerminateActive,
    /// Nothing to do.
    None,
}

/// Decide the contract effect of a room moving from `from` to `to`.
pub fn cascade_for_room_change(from: RoomStatus, to: RoomStatus) -> ContractCascade {
    if from == to {
        return ContractCascade::None;
    }
    match to {
        RoomStatus::Available => ContractCascade::ExpireActive,
        RoomStatus::Used => ContractCascade::None,
        RoomStatus::Maintenance => ContractCascade::TerminateActive,
    }
}

/// Reason recorded on contracts closed by a room status change.
pub fn room_change_reason(room_id: DbId, to: RoomStatus) -> String {
    match to {
        RoomStatus::Available => format!("Room #{room_id} was made available"),
        other => format!("Room #{room_id} changed status to {}", other.name()),
    }
}

/// Validate a status requested directly on a room.
///
/// `used` is derived from contracts and cannot be set by hand.
pub fn validate_manual_room_status(to: RoomStatus) -> Result<(), CoreError> {
    if to == RoomStatus::Used {
        return Err(CoreError::invalid_field(
            "status",
            "A room becomes used only through an active contract",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Terms and renewal
// ---------------------------------------------------------------------------

/// Validate dates and amounts of a contract.
pub fn validate_terms(
    start_date: NaiveDate,
    end_date: NaiveDate,
    monthly_price: Money,
    deposit_amount: Money,
) -> Result<(), CoreError> {
    if end_date <= start_date {
        return Err(CoreError::invalid_field(
            "end_date",
            "end_date must be after start_date",
        ));
    }
    if monthly_price < 0 {
        return Err(CoreError::invalid_field(
            "monthly_price",
            "monthly_price must not be negative",
        ));
    }
    if deposit_amount < 0 {
        return Err(CoreError::invalid_field(
            "deposit_amount",
            "deposit_amount must not be negative",
        ));
    }
    Ok(())
}

/// Validate a deposit status string.
pub fn validate_deposit_status(status: &str) -> Result<(), CoreError> {
    if VALID_DEPOSIT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::invalid_field(
            "deposit_status",
            format!(
                "Invalid deposit status '{status}'. Must be one of: {}",
                VALID_DEPOSIT_STATUSES.join(", ")
            ),
        ))
    }
}

/// Whole calendar months from `start` to `end` (partial months are dropped).
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months
}

/// Resolve the renewal interval stored on a contract.
///
/// Without auto-renew there is no interval. With auto-renew, an explicit
/// value must be positive; a missing one is derived from the term and falls
/// back to [`DEFAULT_RENEWAL_MONTHS`].
pub fn resolve_renewal_months(
    auto_renew: bool,
    time_renew: Option<i32>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Option<i32>, CoreError> {
    if !auto_renew {
        return Ok(None);
    }
    match time_renew {
        Some(months) if months > 0 => Ok(Some(months)),
        Some(_) => Err(CoreError::invalid_field(
            "time_renew",
            "time_renew must be a positive number of months",
        )),
        None => {
            let derived = months_between(start_date, end_date);
            Ok(Some(if derived > 0 {
                derived
            } else {
                DEFAULT_RENEWAL_MONTHS
            }))
        }
    }
}

/// What the daily sweep does with an active contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// Push the end date forward.
    Renew { new_end_date: NaiveDate },
    /// Close the contract as expired.
    Expire,
}

/// Decide the sweep action for an active contract, or `None` while it is
/// still within its term.
///
/// The new end date is `end_date` plus a whole number of renewal steps,
/// counted from `end_date` itself. An end date on the last day of its month
/// stays on the last day of the month.
pub fn sweep_action(
    end_date: NaiveDate,
    auto_renew: bool,
    time_renew: Option<i32>,
    today: NaiveDate,
) -> Option<SweepAction> {
    if end_date >= today {
        return None;
    }
    if !auto_renew {
        return Some(SweepAction::Expire);
    }

    let step = time_renew.filter(|m| *m > 0).unwrap_or(DEFAULT_RENEWAL_MONTHS) as u32;
    let month_end = is_last_day_of_month(end_date);
    let mut steps: u32 = 1;
    loop {
        let candidate = step
            .checked_mul(steps)
            .and_then(|months| end_date.checked_add_months(Months::new(months)));
        let candidate = match candidate {
            Some(date) if month_end => last_day_of_month(date),
            other => other,
        };
        match candidate {
            Some(new_end) if new_end >= today => {
                return Some(SweepAction::Renew {
                    new_end_date: new_end,
                })
            }
            Some(_) => steps += 1,
            None => return Some(SweepAction::Expire),
        }
    }
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// The tenant addressed when a single recipient is needed: lowest user id.
pub fn primary_tenant(tenant_ids: &[DbId]) -> Option<DbId> {
    tenant_ids.iter().copied().min()
}
