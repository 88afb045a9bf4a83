//! HMAC-SHA256 signatures for gateway requests and webhooks.
//!
//! Both directions sign the same canonical form: the fields sorted by key
//! and joined as `key=value&key=value`, keyed with the checksum key, hex
//! encoded.

use hmac::{Hmac, Mac};
use roomkeep_core::types::Money;
use serde::Deserialize;
use sha2::Sha256;

use crate::{GatewayError, PaymentOrder};

type HmacSha256 = Hmac<Sha256>;

/// Gateway result code meaning success.
pub const CODE_SUCCESS: &str = "00";

fn mac_for(checksum_key: &str, canonical: &str) -> Result<HmacSha256, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(checksum_key.as_bytes())?;
    mac.update(canonical.as_bytes());
    Ok(mac)
}

/// Canonical `key=value&...` form with keys in ascending order.
pub fn canonical_form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = fields.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex HMAC of a canonical string.
pub fn sign(checksum_key: &str, canonical: &str) -> Result<String, GatewayError> {
    Ok(hex::encode(mac_for(checksum_key, canonical)?.finalize().into_bytes()))
}

/// Signature sent with a new payment order.
pub fn payment_order_signature(
    checksum_key: &str,
    order: &PaymentOrder,
) -> Result<String, GatewayError> {
    let canonical = canonical_form([
        ("amount", order.amount.to_string()),
        ("cancelUrl", order.cancel_url.clone()),
        ("description", order.description.clone()),
        ("orderCode", order.order_code.to_string()),
        ("returnUrl", order.return_url.clone()),
    ]);
    sign(checksum_key, &canonical)
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Body the gateway posts to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub code: String,
    pub desc: String,
    #[serde(default)]
    pub success: bool,
    /// Signed fields; kept raw so the canonical form covers every key the
    /// gateway sent.
    pub data: serde_json::Map<String, serde_json::Value>,
    pub signature: String,
}

/// The verified content of a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    pub order_code: i64,
    pub amount: Money,
    pub code: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl WebhookData {
    /// Whether the gateway reports the order as paid.
    pub fn is_paid(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

fn field_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Canonical form of a webhook's `data` object.
pub fn webhook_canonical(data: &serde_json::Map<String, serde_json::Value>) -> String {
    canonical_form(data.iter().map(|(k, v)| (k.as_str(), field_value(v))))
}

/// Verify a webhook signature and decode its data.
///
/// The comparison runs in constant time.
pub fn verify_webhook(checksum_key: &str, payload: &WebhookPayload) -> Result<WebhookData, GatewayError> {
    let expected = hex::decode(&payload.signature).ok_or(GatewayError::InvalidSignature)?;
    mac_for(checksum_key, &webhook_canonical(&payload.data))?
        .verify_slice(&expected)
        .map_err(|_| GatewayError::InvalidSignature)?;

    serde_json::from_value(serde_json::Value::Object(payload.data.clone())).map_err(|e| {
        GatewayError::Rejected {
            code: payload.code.clone(),
            desc: format!("Malformed webhook data: {e}"),
        }
    })
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or a non-hex digit.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
