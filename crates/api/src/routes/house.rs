//! Route definitions for the `/houses` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::house;
use crate::state::AppState;

/// Routes mounted at `/houses`.
///
/// ```text
/// GET    /              -> list
/// POST   /              -> create
/// GET    /{id}          -> get_by_id
/// PUT    /{id}          -> update
/// DELETE /{id}          -> delete
/// GET    /{id}/rooms    -> list_rooms
/// POST   /{id}/rooms    -> create_room
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(house::list).post(house::create))
        .route(
            "/{id}",
            get(house::get_by_id)
                .put(house::update)
                .delete(house::delete),
        )
        .route("/{id}/rooms", get(house::list_rooms).post(house::create_room))
}
