//! Contract entity model and DTOs.

use chrono::NaiveDate;
use roomkeep_core::contract::primary_tenant;
use roomkeep_core::status::StatusId;
use roomkeep_core::types::{DbId, Money, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `contracts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contract {
    pub id: DbId,
    pub room_id: DbId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_price: Money,
    pub deposit_amount: Money,
    pub deposit_status: String,
    pub status_id: StatusId,
    pub auto_renew: bool,
    pub time_renew: Option<i32>,
    pub termination_reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<DbId>,
    pub updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A contract with its tenants ordered by user id.
#[derive(Debug, Clone, Serialize)]
pub struct ContractWithTenants {
    #[serde(flatten)]
    pub contract: Contract,
    pub tenant_ids: Vec<DbId>,
    /// The tenant the contract is addressed to: the lowest user id.
    pub primary_tenant_id: Option<DbId>,
}

impl ContractWithTenants {
    pub fn new(contract: Contract, tenant_ids: Vec<DbId>) -> Self {
        let primary_tenant_id = primary_tenant(&tenant_ids);
        Self {
            contract,
            tenant_ids,
            primary_tenant_id,
        }
    }
}

/// Insert payload. Validation and status resolution happen in the service
/// layer; `time_renew` is already resolved when `auto_renew` is set.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub room_id: DbId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_price: Money,
    pub deposit_amount: Money,
    pub deposit_status: String,
    pub status_id: StatusId,
    pub auto_renew: bool,
    pub time_renew: Option<i32>,
    pub notes: Option<String>,
    pub created_by: DbId,
}

/// Merged field set written back on update.
#[derive(Debug, Clone)]
pub struct ContractChanges {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_price: Money,
    pub deposit_amount: Money,
    pub deposit_status: String,
    pub status_id: StatusId,
    pub auto_renew: bool,
    pub time_renew: Option<i32>,
    pub termination_reason: Option<String>,
    pub notes: Option<String>,
    pub updated_by: DbId,
}

/// Request body for creating a contract.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContract {
    pub room_id: DbId,
    pub tenant_ids: Vec<DbId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_price: Money,
    pub deposit_amount: Option<Money>,
    pub deposit_status: Option<String>,
    /// `draft` or `active`; defaults to `draft`.
    pub status: Option<String>,
    pub auto_renew: Option<bool>,
    pub time_renew: Option<i32>,
    pub notes: Option<String>,
}

/// Request body for updating a contract. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContract {
    pub tenant_ids: Option<Vec<DbId>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_price: Option<Money>,
    pub deposit_amount: Option<Money>,
    pub deposit_status: Option<String>,
    pub status: Option<String>,
    pub auto_renew: Option<bool>,
    pub time_renew: Option<i32>,
    pub termination_reason: Option<String>,
    pub notes: Option<String>,
}

/// Filters for listing contracts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractFilter {
    pub room_id: Option<DbId>,
    pub house_id: Option<DbId>,
    pub status_id: Option<StatusId>,
    /// Restrict to houses managed by this user.
    pub manager_id: Option<DbId>,
    /// Restrict to contracts this user is a tenant on.
    pub tenant_id: Option<DbId>,
}
