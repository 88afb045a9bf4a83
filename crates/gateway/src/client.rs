//! HTTP implementation of [`PaymentGateway`].
//!
//! Every call is bounded by the configured timeout; a timeout surfaces as
//! [`GatewayError::Request`] like any other transport failure.

use async_trait::async_trait;
use roomkeep_core::payment::GatewayStatus;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::signature::{payment_order_signature, CODE_SUCCESS};
use crate::{CheckoutLink, GatewayError, PaymentGateway, PaymentOrder};

/// Response envelope shared by every gateway endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    desc: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedOrder {
    checkout_url: String,
    #[serde(default)]
    qr_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderStatus {
    status: String,
}

/// Gateway client over `reqwest`.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
    }

    // ---- private helpers ----

    /// Ensure a 2xx status, returning the body text of failures.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse the envelope and unwrap its data, rejecting non-success codes.
    async fn parse_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let envelope: Envelope<T> = Self::ensure_success(response).await?.json().await?;
        match envelope.data {
            Some(data) if envelope.code == CODE_SUCCESS => Ok(data),
            _ => Err(GatewayError::Rejected {
                code: envelope.code,
                desc: envelope.desc,
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_order(&self, order: &PaymentOrder) -> Result<CheckoutLink, GatewayError> {
        let body = CreateOrderBody {
            order_code: order.order_code,
            amount: order.amount,
            description: &order.description,
            return_url: &order.return_url,
            cancel_url: &order.cancel_url,
            signature: payment_order_signature(&self.config.checksum_key, order)?,
        };

        let response = self
            .request(reqwest::Method::POST, "/v2/payment-requests")
            .json(&body)
            .send()
            .await?;
        let created: CreatedOrder = Self::parse_envelope(response).await?;

        tracing::info!(order_code = order.order_code, amount = order.amount, "Gateway order created");
        Ok(CheckoutLink {
            checkout_url: created.checkout_url,
            qr_code: created.qr_code,
        })
    }

    async fn get_payment_status(&self, order_code: i64) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v2/payment-requests/{order_code}"))
            .send()
            .await?;
        let order: OrderStatus = Self::parse_envelope(response).await?;
        Ok(GatewayStatus::parse(&order.status))
    }
}

/// Stand-in used when no gateway is configured; every call fails with
/// [`GatewayError::NotConfigured`].
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_payment_order(&self, _order: &PaymentOrder) -> Result<CheckoutLink, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn get_payment_status(&self, _order_code: i64) -> Result<GatewayStatus, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
