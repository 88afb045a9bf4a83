//! Payment gateway collaborator.
//!
//! [`PaymentGateway`] is the seam between payment reconciliation and the
//! remote gateway: the HTTP implementation lives in [`client`], tests
//! substitute their own. Request and webhook signatures are in
//! [`signature`].

pub mod client;
pub mod config;
pub mod signature;

use async_trait::async_trait;
use roomkeep_core::payment::GatewayStatus;
use roomkeep_core::types::Money;
use serde::{Deserialize, Serialize};

pub use client::{DisabledGateway, HttpPaymentGateway};
pub use config::GatewayConfig;
pub use signature::{verify_webhook, WebhookData, WebhookPayload};

/// Errors from the payment gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request failed or timed out.
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The gateway answered 2xx with an error code in the envelope.
    #[error("Gateway rejected the request ({code}): {desc}")]
    Rejected { code: String, desc: String },

    /// Webhook signature missing or wrong.
    #[error("Invalid gateway signature")]
    InvalidSignature,

    /// The checksum key cannot key an HMAC.
    #[error("Invalid checksum key")]
    InvalidKey(#[from] hmac::digest::InvalidLength),

    /// No gateway is configured for this deployment.
    #[error("Payment gateway is not configured")]
    NotConfigured,
}

/// A payment order to open at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOrder {
    pub order_code: i64,
    pub amount: Money,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Where the payer completes an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLink {
    pub checkout_url: String,
    pub qr_code: Option<String>,
}

/// Outbound operations against the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment order and return its checkout link.
    async fn create_payment_order(&self, order: &PaymentOrder) -> Result<CheckoutLink, GatewayError>;

    /// Fetch the authoritative status of an order.
    async fn get_payment_status(&self, order_code: i64) -> Result<GatewayStatus, GatewayError>;
}
