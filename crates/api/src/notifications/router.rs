//! Event-to-notification routing engine.
//!
//! Recipients are resolved from the event's room and source entity: contract
//! events reach the contract's tenants and the house manager, invoice events
//! reach the room's current tenants, cash reports reach the manager. The
//! user who caused the event is never notified about it.

use std::collections::BTreeSet;

use roomkeep_core::notifications::{
    notification_type_for, EVENT_CASH_CONFIRMED, EVENT_CASH_REJECTED, EVENT_CASH_REPORTED,
    EVENT_CONTRACT_ACTIVATED, EVENT_CONTRACT_CREATED, EVENT_CONTRACT_EXPIRED,
    EVENT_CONTRACT_RENEWED, EVENT_CONTRACT_TERMINATED, EVENT_INVOICE_CREATED,
    EVENT_INVOICE_DELETED, EVENT_INVOICE_PAID, EVENT_INVOICE_UPDATED,
};
use roomkeep_core::types::DbId;
use roomkeep_db::models::notification::NewNotification;
use roomkeep_db::repositories::{ContractRepo, NotificationRepo, RoomRepo};
use roomkeep_db::DbPool;
use roomkeep_events::PlatformEvent;
use tokio::sync::broadcast;

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Tenants of the source contract plus the house manager.
    ContractParties,
    /// Current tenants of the room.
    RoomTenants,
    /// The house manager.
    Manager,
    /// Current tenants of the room plus the house manager.
    TenantsAndManager,
}

/// Audience of an event type; `None` for events nobody is notified about.
pub fn audience_for(event_type: &str) -> Option<Audience> {
    match event_type {
        t if t.starts_with("contract.") => Some(Audience::ContractParties),
        EVENT_INVOICE_CREATED | EVENT_INVOICE_UPDATED | EVENT_INVOICE_DELETED => {
            Some(Audience::RoomTenants)
        }
        EVENT_CASH_REPORTED => Some(Audience::Manager),
        EVENT_INVOICE_PAID | EVENT_CASH_CONFIRMED | EVENT_CASH_REJECTED => {
            Some(Audience::TenantsAndManager)
        }
        _ => None,
    }
}

/// Human-readable notification text for an event.
pub fn notification_content(event: &PlatformEvent) -> String {
    let id = event
        .source_entity_id
        .map(|id| format!(" #{id}"))
        .unwrap_or_default();
    let reason = event
        .payload
        .get("termination_reason")
        .and_then(|v| v.as_str())
        .map(|r| format!(": {r}"))
        .unwrap_or_default();

    match event.event_type.as_str() {
        EVENT_CONTRACT_CREATED => format!("Contract{id} was created"),
        EVENT_CONTRACT_ACTIVATED => format!("Contract{id} is now active"),
        EVENT_CONTRACT_RENEWED => format!("Contract{id} was renewed"),
        EVENT_CONTRACT_EXPIRED => format!("Contract{id} has expired{reason}"),
        EVENT_CONTRACT_TERMINATED => format!("Contract{id} was terminated{reason}"),
        EVENT_INVOICE_CREATED => format!("New invoice{id} is available"),
        EVENT_INVOICE_UPDATED => format!("Invoice{id} was updated"),
        EVENT_INVOICE_DELETED => format!("Invoice{id} was removed"),
        EVENT_INVOICE_PAID => format!("Invoice{id} was paid"),
        EVENT_CASH_REPORTED => format!("Cash payment reported for invoice{id}"),
        EVENT_CASH_CONFIRMED => format!("Cash payment for invoice{id} was confirmed"),
        EVENT_CASH_REJECTED => format!("Cash payment for invoice{id} was rejected"),
        other => format!("{other}{id}"),
    }
}

/// Client link for the event's source entity.
fn notification_url(event: &PlatformEvent) -> Option<String> {
    let id = event.source_entity_id?;
    match event.source_entity_type.as_deref()? {
        "contract" => Some(format!("/contracts/{id}")),
        "invoice" if event.event_type != EVENT_INVOICE_DELETED => Some(format!("/invoices/{id}")),
        _ => None,
    }
}

/// Stores notifications for platform events.
///
/// Delivery is best effort: failures are logged and never reach the request
/// that published the event.
pub struct NotificationRouter {
    pool: DbPool,
}

impl NotificationRouter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run the main routing loop until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.route_event(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            room_id = ?event.room_id,
                            source_id = ?event.source_entity_id,
                            "Failed to route event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Store one notification per recipient of `event`.
    pub async fn route_event(&self, event: &PlatformEvent) -> Result<usize, sqlx::Error> {
        let Some(audience) = audience_for(&event.event_type) else {
            return Ok(0);
        };
        let mut targets = self.determine_targets(audience, event).await?;
        if let Some(actor) = event.actor_user_id {
            targets.remove(&actor);
        }

        let content = notification_content(event);
        let url = notification_url(event);
        for user_id in &targets {
            NotificationRepo::create(
                &self.pool,
                &NewNotification {
                    user_id: *user_id,
                    notification_type: notification_type_for(&event.event_type).to_string(),
                    content: content.clone(),
                    url: url.clone(),
                },
            )
            .await?;
        }

        tracing::debug!(
            event_type = %event.event_type,
            recipients = targets.len(),
            "Event routed"
        );
        Ok(targets.len())
    }

    async fn determine_targets(
        &self,
        audience: Audience,
        event: &PlatformEvent,
    ) -> Result<BTreeSet<DbId>, sqlx::Error> {
        let mut targets = BTreeSet::new();

        match audience {
            Audience::ContractParties => {
                if let Some(contract_id) = event.source_entity_id {
                    targets.extend(ContractRepo::tenant_ids(&self.pool, contract_id).await?);
                }
                targets.extend(self.manager_of(event.room_id).await?);
            }
            Audience::RoomTenants => {
                targets.extend(self.room_tenants(event.room_id).await?);
            }
            Audience::Manager => {
                targets.extend(self.manager_of(event.room_id).await?);
            }
            Audience::TenantsAndManager => {
                targets.extend(self.room_tenants(event.room_id).await?);
                targets.extend(self.manager_of(event.room_id).await?);
            }
        }

        Ok(targets)
    }

    async fn room_tenants(&self, room_id: Option<DbId>) -> Result<Vec<DbId>, sqlx::Error> {
        match room_id {
            Some(room_id) => RoomRepo::tenant_ids(&self.pool, room_id, true).await,
            None => Ok(Vec::new()),
        }
    }

    async fn manager_of(&self, room_id: Option<DbId>) -> Result<Option<DbId>, sqlx::Error> {
        let Some(room_id) = room_id else {
            return Ok(None);
        };
        Ok(RoomRepo::find_scope(&self.pool, room_id)
            .await?
            .and_then(|scope| scope.manager_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_events_reach_contract_parties() {
        for event_type in [
            EVENT_CONTRACT_CREATED,
            EVENT_CONTRACT_ACTIVATED,
            EVENT_CONTRACT_EXPIRED,
            EVENT_CONTRACT_TERMINATED,
            EVENT_CONTRACT_RENEWED,
        ] {
            assert_eq!(audience_for(event_type), Some(Audience::ContractParties));
        }
    }

    #[test]
    fn cash_reports_go_to_the_manager_only() {
        assert_eq!(audience_for(EVENT_CASH_REPORTED), Some(Audience::Manager));
        assert_eq!(audience_for(EVENT_CASH_CONFIRMED), Some(Audience::TenantsAndManager));
        assert_eq!(audience_for(EVENT_INVOICE_UPDATED), Some(Audience::RoomTenants));
        assert_eq!(audience_for("system.startup"), None);
    }

    #[test]
    fn content_includes_termination_reason() {
        let event = PlatformEvent::new(EVENT_CONTRACT_TERMINATED)
            .with_source("contract", 12)
            .with_payload(serde_json::json!({ "termination_reason": "Room under maintenance" }));
        assert_eq!(
            notification_content(&event),
            "Contract #12 was terminated: Room under maintenance"
        );
    }

    #[test]
    fn deleted_invoices_have_no_link() {
        let updated = PlatformEvent::new(EVENT_INVOICE_UPDATED).with_source("invoice", 3);
        let deleted = PlatformEvent::new(EVENT_INVOICE_DELETED).with_source("invoice", 3);
        assert_eq!(notification_url(&updated).as_deref(), Some("/invoices/3"));
        assert_eq!(notification_url(&deleted), None);
    }
}
