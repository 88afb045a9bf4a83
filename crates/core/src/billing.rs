//! Service usage and invoice arithmetic.
//!
//! Meter continuity, usage/price computation, and the manual-item diff used
//! when an invoice is edited. The service layer persists the results; totals
//! are always re-derived from persisted items with [`sum_amounts`].

use std::collections::HashSet;

use crate::error::CoreError;
use crate::types::{DbId, Money};

/// Invoice created by hand with free-form items.
pub const INVOICE_TYPE_CUSTOM: &str = "custom";
/// Invoice generated from a room's monthly service usage.
pub const INVOICE_TYPE_SERVICE_USAGE: &str = "service_usage";

/// Item entered by a human editor; preserved across reconciliation runs.
pub const ITEM_SOURCE_MANUAL: &str = "manual";
/// Item owned by the usage reconciliation; rebuilt on every run.
pub const ITEM_SOURCE_SERVICE_USAGE: &str = "service_usage";

/// Earliest billing year accepted.
pub const MIN_BILLING_YEAR: i32 = 2000;
/// Latest billing year accepted.
pub const MAX_BILLING_YEAR: i32 = 2100;

/// Validate a billing period.
pub fn validate_period(month: i16, year: i32) -> Result<(), CoreError> {
    if !(1..=12).contains(&month) {
        return Err(CoreError::invalid_field(
            "month",
            format!("month must be between 1 and 12, got {month}"),
        ));
    }
    if !(MIN_BILLING_YEAR..=MAX_BILLING_YEAR).contains(&year) {
        return Err(CoreError::invalid_field(
            "year",
            format!("year must be between {MIN_BILLING_YEAR} and {MAX_BILLING_YEAR}, got {year}"),
        ));
    }
    Ok(())
}

/// The billing period immediately before `(month, year)`.
pub fn previous_period(month: i16, year: i32) -> (i16, i32) {
    if month <= 1 {
        (12, year - 1)
    } else {
        (month - 1, year)
    }
}

/// Submitted readings for one room service.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageReading {
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: Option<f64>,
}

/// Normalised usage for one room service and period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedUsage {
    pub start_meter: Option<f64>,
    pub end_meter: Option<f64>,
    pub usage_value: f64,
}

impl ComputedUsage {
    /// Zero usage means "not applicable this period": the row is removed,
    /// never billed as zero.
    pub fn is_billable(&self) -> bool {
        self.usage_value > 0.0
    }
}

/// Compute the usage of one service from submitted readings.
///
/// For metered services a missing `start_meter` is seeded from
/// `previous_end_meter` (0 when there is no prior period), and the usage is
/// the meter delta whenever an `end_meter` is present. Fixed services take
/// `usage_value` as given.
pub fn compute_usage(
    service_name: &str,
    is_metered: bool,
    reading: &UsageReading,
    previous_end_meter: Option<f64>,
) -> Result<ComputedUsage, CoreError> {
    if let (Some(start), Some(end)) = (reading.start_meter, reading.end_meter) {
        if start > end {
            return Err(CoreError::Validation(format!(
                "Service '{service_name}': end meter ({end}) is lower than start meter ({start})"
            )));
        }
    }

    let computed = if is_metered {
        let start = reading
            .start_meter
            .or(previous_end_meter)
            .unwrap_or(0.0);
        match reading.end_meter {
            Some(end) => {
                if start > end {
                    return Err(CoreError::Validation(format!(
                        "Service '{service_name}': end meter ({end}) is lower than the previous reading ({start})"
                    )));
                }
                ComputedUsage {
                    start_meter: Some(start),
                    end_meter: Some(end),
                    usage_value: end - start,
                }
            }
            None => ComputedUsage {
                start_meter: Some(start),
                end_meter: None,
                usage_value: reading.usage_value.unwrap_or(0.0),
            },
        }
    } else {
        ComputedUsage {
            start_meter: None,
            end_meter: None,
            usage_value: reading.usage_value.unwrap_or(0.0),
        }
    };

    if !computed.usage_value.is_finite() || computed.usage_value < 0.0 {
        return Err(CoreError::Validation(format!(
            "Service '{service_name}': usage must be a non-negative number"
        )));
    }
    Ok(computed)
}

/// Price charged for `usage_value` units at `unit_price`, rounded to whole
/// currency units.
pub fn price_for(usage_value: f64, unit_price: Money) -> Money {
    (usage_value * unit_price as f64).round() as Money
}

/// Description written on a service-usage invoice item.
pub fn usage_item_description(service_name: &str, month: i16, year: i32) -> String {
    format!("{service_name} {month:02}/{year}")
}

/// Sum of item amounts.
pub fn sum_amounts<I>(amounts: I) -> Money
where
    I: IntoIterator<Item = Money>,
{
    amounts.into_iter().sum()
}

/// Validate one manual invoice item.
pub fn validate_manual_item(description: &str, amount: Money) -> Result<(), CoreError> {
    if description.trim().is_empty() {
        return Err(CoreError::invalid_field(
            "description",
            "Invoice item description must not be empty",
        ));
    }
    if amount < 0 {
        return Err(CoreError::invalid_field(
            "amount",
            "Invoice item amount must not be negative",
        ));
    }
    Ok(())
}

/// Plan for reconciling an invoice's manual items against an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualItemDiff {
    /// Existing manual items missing from the submission.
    pub to_delete: Vec<DbId>,
    /// Existing manual items present in the submission.
    pub to_update: Vec<DbId>,
    /// Submitted items without an id.
    pub to_create: usize,
}

/// Diff submitted item ids against the invoice's existing manual items.
///
/// A submitted id that is not one of `existing_manual` (unknown, belongs to
/// another invoice, or is a service-usage item) is rejected.
pub fn diff_manual_items(
    existing_manual: &[DbId],
    submitted: &[Option<DbId>],
) -> Result<ManualItemDiff, CoreError> {
    let existing: HashSet<DbId> = existing_manual.iter().copied().collect();
    let mut kept = HashSet::new();
    let mut diff = ManualItemDiff::default();

    for id in submitted {
        match id {
            Some(id) => {
                if !existing.contains(id) {
                    return Err(CoreError::invalid_field(
                        "items",
                        format!("Item {id} is not a manual item of this invoice"),
                    ));
                }
                if !kept.insert(*id) {
                    return Err(CoreError::invalid_field(
                        "items",
                        format!("Item {id} was submitted more than once"),
                    ));
                }
                diff.to_update.push(*id);
            }
            None => diff.to_create += 1,
        }
    }

    diff.to_delete = existing_manual
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();
    Ok(diff)
}
