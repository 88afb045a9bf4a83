//! Payment reconciliation primitives.
//!
//! The gateway is the only authority on whether an order was paid; client
//! supplied flags are never trusted. Invoices are linked to a gateway order
//! through a transaction code derived deterministically from the order code.

use serde::Serialize;

use crate::error::CoreError;
use crate::status::PaymentStatus;
use crate::types::{DbId, Timestamp};

/// Prefix of transaction codes stored on invoices.
pub const TRANSACTION_CODE_PREFIX: &str = "INV";

/// `payment_methods` id of cash payments.
pub const PAYMENT_METHOD_CASH: i16 = 1;
/// `payment_methods` id of gateway (bank transfer / QR) payments.
pub const PAYMENT_METHOD_GATEWAY: i16 = 2;

/// Transaction code stored on every invoice covered by `order_code`.
pub fn transaction_code_for(order_code: i64) -> String {
    format!("{TRANSACTION_CODE_PREFIX}{order_code}")
}

/// Order code carried by a transaction code, if it is one of ours.
pub fn order_code_of(transaction_code: &str) -> Option<i64> {
    transaction_code
        .strip_prefix(TRANSACTION_CODE_PREFIX)?
        .parse()
        .ok()
}

/// Derive a numeric gateway order code from the checkout time.
pub fn order_code_at(now: Timestamp) -> i64 {
    now.timestamp_millis()
}

/// Order status as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Paid,
    Pending,
    Processing,
    Cancelled,
    Expired,
    Unknown,
}

impl GatewayStatus {
    /// Parse the gateway's status string (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PAID" => GatewayStatus::Paid,
            "PENDING" => GatewayStatus::Pending,
            "PROCESSING" => GatewayStatus::Processing,
            "CANCELLED" => GatewayStatus::Cancelled,
            "EXPIRED" => GatewayStatus::Expired,
            _ => GatewayStatus::Unknown,
        }
    }

    pub fn is_paid(self) -> bool {
        self == GatewayStatus::Paid
    }

    /// An order that can still be paid, or was paid and not yet settled.
    /// Its invoices may not be put into another order.
    pub fn holds_invoices(self) -> bool {
        matches!(
            self,
            GatewayStatus::Paid | GatewayStatus::Pending | GatewayStatus::Processing
        )
    }
}

/// Outcome classification of a reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentResultStatus {
    Success,
    Failed,
}

/// Result of verifying or settling a gateway order.
///
/// External failures are reported here with `status = FAILED` rather than as
/// errors, so callers can tell "did not happen" apart from "retry later".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentResult {
    pub status: PaymentResultStatus,
    pub order_code: i64,
    pub message: String,
    /// Set when the order was paid but every matching invoice was already
    /// settled (or none matched).
    pub nothing_to_update: bool,
    pub updated_invoice_ids: Vec<DbId>,
    pub room_id: Option<DbId>,
}

impl PaymentResult {
    pub fn failed(order_code: i64, message: impl Into<String>) -> Self {
        Self {
            status: PaymentResultStatus::Failed,
            order_code,
            message: message.into(),
            nothing_to_update: false,
            updated_invoice_ids: Vec::new(),
            room_id: None,
        }
    }

    pub fn nothing_to_update(order_code: i64) -> Self {
        Self {
            status: PaymentResultStatus::Success,
            order_code,
            message: "Payment already recorded".to_string(),
            nothing_to_update: true,
            updated_invoice_ids: Vec::new(),
            room_id: None,
        }
    }

    pub fn settled(order_code: i64, updated_invoice_ids: Vec<DbId>, room_id: Option<DbId>) -> Self {
        Self {
            status: PaymentResultStatus::Success,
            order_code,
            message: format!("{} invoice(s) marked as paid", updated_invoice_ids.len()),
            nothing_to_update: false,
            updated_invoice_ids,
            room_id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PaymentResultStatus::Success
    }
}

/// Ensure an invoice can enter a new gateway checkout or cash report.
pub fn ensure_payable(invoice_id: DbId, status: PaymentStatus) -> Result<(), CoreError> {
    match status {
        PaymentStatus::Pending | PaymentStatus::Failed => Ok(()),
        PaymentStatus::Waiting => Err(CoreError::Conflict(format!(
            "Invoice {invoice_id} is waiting for cash payment confirmation"
        ))),
        PaymentStatus::Completed => Err(CoreError::Conflict(format!(
            "Invoice {invoice_id} is already paid"
        ))),
        PaymentStatus::Refunded => Err(CoreError::Conflict(format!(
            "Invoice {invoice_id} was refunded"
        ))),
    }
}

/// Ensure a cash confirmation or rejection targets a waiting invoice.
pub fn ensure_waiting(invoice_id: DbId, status: PaymentStatus) -> Result<(), CoreError> {
    if status == PaymentStatus::Waiting {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Invoice {invoice_id} is {}, not waiting for cash confirmation",
            status.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn transaction_code_is_prefixed_order_code() {
        assert_eq!(transaction_code_for(1_700_000_000_123), "INV1700000000123");
    }

    #[test]
    fn order_code_is_read_back_from_transaction_code() {
        assert_eq!(order_code_of("INV1700000000123"), Some(1_700_000_000_123));
        assert_eq!(order_code_of("FT123"), None);
        assert_eq!(order_code_of("INVabc"), None);
    }

    #[test]
    fn open_orders_hold_their_invoices() {
        assert!(GatewayStatus::Pending.holds_invoices());
        assert!(GatewayStatus::Paid.holds_invoices());
        assert!(!GatewayStatus::Expired.holds_invoices());
        assert!(!GatewayStatus::Cancelled.holds_invoices());
    }

    #[test]
    fn order_code_is_millisecond_timestamp() {
        let now = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(order_code_at(now), 1_735_689_600_000);
    }

    #[test]
    fn gateway_status_parsing() {
        assert_eq!(GatewayStatus::parse("PAID"), GatewayStatus::Paid);
        assert_eq!(GatewayStatus::parse("paid"), GatewayStatus::Paid);
        assert_eq!(GatewayStatus::parse("CANCELLED"), GatewayStatus::Cancelled);
        assert_eq!(GatewayStatus::parse("weird"), GatewayStatus::Unknown);
        assert!(!GatewayStatus::Pending.is_paid());
    }

    #[test]
    fn result_serializes_screaming_status() {
        let json = serde_json::to_value(PaymentResult::failed(7, "gateway down")).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["order_code"], 7);
        let json = serde_json::to_value(PaymentResult::nothing_to_update(7)).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["nothing_to_update"], true);
    }

    #[test]
    fn settled_result_lists_ids() {
        let result = PaymentResult::settled(5, vec![11, 12], Some(3));
        assert!(result.is_success());
        assert_eq!(result.updated_invoice_ids, vec![11, 12]);
        assert_eq!(result.room_id, Some(3));
    }

    #[test]
    fn payable_statuses() {
        assert!(ensure_payable(1, PaymentStatus::Pending).is_ok());
        assert!(ensure_payable(1, PaymentStatus::Failed).is_ok());
        assert!(ensure_payable(1, PaymentStatus::Waiting).is_err());
        assert!(ensure_payable(1, PaymentStatus::Completed).is_err());
    }

    #[test]
    fn only_waiting_invoices_take_cash_decisions() {
        assert!(ensure_waiting(1, PaymentStatus::Waiting).is_ok());
        assert!(ensure_waiting(1, PaymentStatus::Pending).is_err());
    }
}
