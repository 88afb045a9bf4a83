//! Route definitions for the `/payments` resource.
//!
//! `/webhook` is called by the payment gateway and carries no bearer token.

use axum::routing::post;
use axum::Router;

use crate::handlers::payment;
use crate::state::AppState;

/// Routes mounted at `/payments`.
///
/// ```text
/// POST   /checkout    -> checkout
/// POST   /verify      -> verify
/// POST   /webhook     -> webhook
/// POST   /cash        -> report_cash
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(payment::checkout))
        .route("/verify", post(payment::verify))
        .route("/webhook", post(payment::webhook))
        .route("/cash", post(payment::report_cash))
}
