//! Route definitions for the `/invoices` resource.
//!
//! Custom invoices are created under `/rooms/{id}/invoices`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::invoice;
use crate::state::AppState;

/// Routes mounted at `/invoices`.
///
/// ```text
/// GET    /                     -> list
/// GET    /{id}                 -> get_by_id
/// PUT    /{id}                 -> update
/// DELETE /{id}                 -> delete
/// POST   /{id}/confirm-cash    -> confirm_cash
/// POST   /{id}/reject-cash     -> reject_cash
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(invoice::list))
        .route(
            "/{id}",
            get(invoice::get_by_id)
                .put(invoice::update)
                .delete(invoice::delete),
        )
        .route("/{id}/confirm-cash", post(invoice::confirm_cash))
        .route("/{id}/reject-cash", post(invoice::reject_cash))
}
