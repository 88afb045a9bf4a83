pub mod contract;
pub mod health;
pub mod house;
pub mod invoice;
pub mod notification;
pub mod payment;
pub mod room;
pub mod service;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /houses                                   list, create (admin)
/// /houses/{id}                              get, update, delete
/// /houses/{id}/rooms                        list, create
///
/// /rooms/{id}                               get, update, delete
/// /rooms/{id}/status                        change status (PUT)
/// /rooms/{id}/services                      list, bind a service
/// /rooms/{id}/services/{room_service_id}    update, unbind
/// /rooms/{id}/service-usage                 read period, save period
/// /rooms/{id}/invoices                      create custom invoice (POST)
///
/// /services                                 list, create (admin)
/// /services/{id}                            update (admin)
///
/// /contracts                                list, create
/// /contracts/{id}                           get, update, delete
/// /contracts/{id}/terminate                 terminate (POST)
///
/// /invoices                                 list
/// /invoices/{id}                            get, update, delete
/// /invoices/{id}/confirm-cash               confirm cash payment (POST)
/// /invoices/{id}/reject-cash                reject cash payment (POST)
///
/// /payments/checkout                        open gateway order (POST)
/// /payments/verify                          verify gateway order (POST)
/// /payments/webhook                         gateway push (POST, signed)
/// /payments/cash                            report cash payment (POST)
///
/// /notifications                            list
/// /notifications/read-all                   mark all read (POST)
/// /notifications/{id}/read                  mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/houses", house::router())
        .nest("/rooms", room::router())
        .nest("/services", service::router())
        .nest("/contracts", contract::router())
        .nest("/invoices", invoice::router())
        .nest("/payments", payment::router())
        .nest("/notifications", notification::router())
}
