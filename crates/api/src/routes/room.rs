//! Route definitions for the `/rooms` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::room;
use crate::state::AppState;

/// Routes mounted at `/rooms`.
///
/// ```text
/// GET    /{id}                               -> get_by_id
/// PUT    /{id}                               -> update
/// DELETE /{id}                               -> delete
/// PUT    /{id}/status                        -> change_status
/// GET    /{id}/services                      -> list_services
/// POST   /{id}/services                      -> add_service
/// PUT    /{id}/services/{room_service_id}    -> update_service
/// DELETE /{id}/services/{room_service_id}    -> remove_service
/// GET    /{id}/service-usage                 -> get_service_usage
/// POST   /{id}/service-usage                 -> save_service_usage
/// POST   /{id}/invoices                      -> create_invoice
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(room::get_by_id).put(room::update).delete(room::delete),
        )
        .route("/{id}/status", put(room::change_status))
        .route(
            "/{id}/services",
            get(room::list_services).post(room::add_service),
        )
        .route(
            "/{id}/services/{room_service_id}",
            put(room::update_service).delete(room::remove_service),
        )
        .route(
            "/{id}/service-usage",
            get(room::get_service_usage).post(room::save_service_usage),
        )
        .route("/{id}/invoices", post(room::create_invoice))
}
