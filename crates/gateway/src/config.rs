//! Gateway configuration loaded from the environment.

use std::time::Duration;

/// Default bound on a single gateway call.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway API, without a trailing slash.
    pub base_url: String,
    pub client_id: String,
    pub api_key: String,
    /// Shared secret for request and webhook signatures.
    pub checksum_key: String,
    /// Where the payer lands after paying.
    pub return_url: String,
    /// Where the payer lands after cancelling.
    pub cancel_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `PAYMENT_GATEWAY_URL` is not set; gateway payments
    /// are then disabled.
    ///
    /// | Variable               | Required | Default |
    /// |------------------------|----------|---------|
    /// | `PAYMENT_GATEWAY_URL`  | yes      | -       |
    /// | `PAYMENT_CLIENT_ID`    | yes      | -       |
    /// | `PAYMENT_API_KEY`      | yes      | -       |
    /// | `PAYMENT_CHECKSUM_KEY` | yes      | -       |
    /// | `PAYMENT_RETURN_URL`   | no       | `""`    |
    /// | `PAYMENT_CANCEL_URL`   | no       | `""`    |
    /// | `PAYMENT_TIMEOUT_SECS` | no       | `10`    |
    ///
    /// # Panics
    ///
    /// Panics when the URL is set but a credential is missing, or the
    /// timeout is not a positive integer.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PAYMENT_GATEWAY_URL").ok()?;
        let required = |name: &str| {
            std::env::var(name)
                .unwrap_or_else(|_| panic!("{name} must be set when PAYMENT_GATEWAY_URL is set"))
        };

        let timeout_secs: u64 = std::env::var("PAYMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("PAYMENT_TIMEOUT_SECS must be a valid u64");
        assert!(timeout_secs > 0, "PAYMENT_TIMEOUT_SECS must be positive");

        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: required("PAYMENT_CLIENT_ID"),
            api_key: required("PAYMENT_API_KEY"),
            checksum_key: required("PAYMENT_CHECKSUM_KEY"),
            return_url: std::env::var("PAYMENT_RETURN_URL").unwrap_or_default(),
            cancel_url: std::env::var("PAYMENT_CANCEL_URL").unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
