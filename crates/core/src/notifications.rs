//! Event type names published on the event bus and the notification types
//! they produce.

pub const EVENT_CONTRACT_CREATED: &str = "contract.created";
pub const EVENT_CONTRACT_ACTIVATED: &str = "contract.activated";
pub const EVENT_CONTRACT_EXPIRED: &str = "contract.expired";
pub const EVENT_CONTRACT_TERMINATED: &str = "contract.terminated";
pub const EVENT_CONTRACT_RENEWED: &str = "contract.renewed";

pub const EVENT_INVOICE_CREATED: &str = "invoice.created";
pub const EVENT_INVOICE_UPDATED: &str = "invoice.updated";
pub const EVENT_INVOICE_DELETED: &str = "invoice.deleted";
pub const EVENT_INVOICE_PAID: &str = "invoice.paid";
pub const EVENT_CASH_REPORTED: &str = "invoice.cash_reported";
pub const EVENT_CASH_CONFIRMED: &str = "invoice.cash_confirmed";
pub const EVENT_CASH_REJECTED: &str = "invoice.cash_rejected";

/// Notification type stored on `notifications.type` for contract events.
pub const NOTIFICATION_CONTRACT: &str = "contract";
/// Notification type for invoice and billing events.
pub const NOTIFICATION_INVOICE: &str = "invoice";
/// Notification type for payment events.
pub const NOTIFICATION_PAYMENT: &str = "payment";

/// Map an event type to the notification type it produces.
pub fn notification_type_for(event_type: &str) -> &'static str {
    if event_type.starts_with("contract.") {
        NOTIFICATION_CONTRACT
    } else if event_type == EVENT_INVOICE_PAID || event_type.starts_with("invoice.cash_") {
        NOTIFICATION_PAYMENT
    } else {
        NOTIFICATION_INVOICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_prefixes_map_to_types() {
        assert_eq!(notification_type_for(EVENT_CONTRACT_EXPIRED), NOTIFICATION_CONTRACT);
        assert_eq!(notification_type_for(EVENT_INVOICE_CREATED), NOTIFICATION_INVOICE);
        assert_eq!(notification_type_for(EVENT_INVOICE_PAID), NOTIFICATION_PAYMENT);
        assert_eq!(notification_type_for(EVENT_CASH_REPORTED), NOTIFICATION_PAYMENT);
    }
}
