//! HTTP-level integration tests for gateway checkout, payment verification,
//! the signed webhook and the cash payment flow.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use common::{
    body_json, expect_data, post_json, post_json_auth, seed_property, Property, StubGateway,
    CHECKSUM_KEY,
};
use roomkeep_core::payment::GatewayStatus;
use roomkeep_gateway::signature::{sign, webhook_canonical};
use serde_json::{json, Value};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn rent_room(pool: &PgPool, p: &Property) {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/contracts",
        json!({
            "room_id": p.room_id,
            "tenant_ids": [p.tenant],
            "start_date": "2026-01-01",
            "end_date": "2026-12-31",
            "monthly_price": 3_000_000,
            "status": "active",
        }),
        &p.manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn custom_invoice(pool: &PgPool, p: &Property, room_id: i64, amount: i64) -> i64 {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{room_id}/invoices"),
        json!({ "month": 3, "year": 2026, "items": [{ "description": "Rent", "amount": amount }] }),
        &p.manager_token(),
    )
    .await;
    expect_data(response, StatusCode::CREATED).await["id"]
        .as_i64()
        .unwrap()
}

async fn checkout(app: Router, p: &Property, ids: &[i64]) -> (StatusCode, Value) {
    let response = post_json_auth(
        app,
        "/api/v1/payments/checkout",
        json!({ "invoice_ids": ids }),
        &p.tenant_token(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn verify(app: Router, p: &Property, order_code: i64) -> Value {
    let response = post_json_auth(
        app,
        "/api/v1/payments/verify",
        json!({ "order_code": order_code }),
        &p.tenant_token(),
    )
    .await;
    expect_data(response, StatusCode::OK).await
}

async fn payment_state(pool: &PgPool, id: i64) -> (i16, Option<String>) {
    sqlx::query_as("SELECT payment_status_id, transaction_code FROM invoices WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn signed_webhook(order_code: i64, code: &str) -> Value {
    let data = json!({
        "orderCode": order_code,
        "amount": 300,
        "code": code,
        "desc": "success",
        "reference": "FT123",
    });
    let signature = sign(CHECKSUM_KEY, &webhook_canonical(data.as_object().unwrap())).unwrap();
    json!({
        "code": "00",
        "desc": "success",
        "success": true,
        "data": data,
        "signature": signature,
    })
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn checkout_tags_invoices_and_returns_link(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let a = custom_invoice(&pool, &p, p.room_id, 100).await;
    let b = custom_invoice(&pool, &p, p.room_id, 200).await;
    let gateway = StubGateway::new(GatewayStatus::Pending);

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (status, json) = checkout(app, &p, &[b, a, b]).await;

    assert_eq!(status, StatusCode::OK);
    let session = &json["data"];
    assert_eq!(session["amount"], 300);
    assert_eq!(session["invoice_ids"], json!([a, b]));
    let order_code = session["order_code"].as_i64().unwrap();
    let transaction_code = format!("INV{order_code}");
    assert_eq!(session["transaction_code"], transaction_code.as_str());
    assert!(session["checkout_url"].as_str().unwrap().contains(&order_code.to_string()));

    let orders = gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].amount, 300);
    assert_eq!(orders[0].return_url, "https://app.test/paid");

    for id in [a, b] {
        let (status_id, code) = payment_state(&pool, id).await;
        assert_eq!(status_id, 1);
        assert_eq!(code.as_deref(), Some(transaction_code.as_str()));
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn open_order_blocks_a_second_checkout(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 300).await;
    let gateway = StubGateway::new(GatewayStatus::Pending);

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (status, json) = checkout(app, &p, &[id]).await;
    assert_eq!(status, StatusCode::OK);
    let first_code = json["data"]["transaction_code"].as_str().unwrap().to_string();

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (status, json) = checkout(app, &p, &[id]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(payment_state(&pool, id).await, (1, Some(first_code)));
    assert_eq!(gateway.orders().len(), 1);

    // Once the first order lapses the invoice can be checked out again.
    gateway.set_status(GatewayStatus::Expired);
    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (status, _) = checkout(app, &p, &[id]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.orders().len(), 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn gateway_failure_rolls_back_checkout(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;
    let gateway = StubGateway::new(GatewayStatus::Pending);
    gateway.set_failing(true);

    let app = common::build_test_app_with_gateway(pool.clone(), gateway);
    let (status, json) = checkout(app, &p, &[id]).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "GATEWAY_ERROR");
    assert_eq!(payment_state(&pool, id).await, (1, None));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn checkout_across_rooms_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let other_room = common::create_room(&pool, p.house_id, "102").await;
    let a = custom_invoice(&pool, &p, p.room_id, 100).await;
    let b = custom_invoice(&pool, &p, other_room, 100).await;

    let app = common::build_test_app(pool.clone());
    let (status, json) = checkout(app, &p, &[a, b]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "invoice_ids");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn checkout_of_paid_invoice_is_conflict(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;
    sqlx::query("UPDATE invoices SET payment_status_id = 3, payment_date = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let app = common::build_test_app(pool.clone());
    let (status, _) = checkout(app, &p, &[id]).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn stranger_cannot_checkout_invoices(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/payments/checkout",
        json!({ "invoice_ids": [id] }),
        &p.other_tenant_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(payment_state(&pool, id).await, (1, None));
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn verify_settles_only_unsettled_invoices(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let a = custom_invoice(&pool, &p, p.room_id, 100).await;
    let b = custom_invoice(&pool, &p, p.room_id, 200).await;
    let gateway = StubGateway::new(GatewayStatus::Paid);

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (_, json) = checkout(app, &p, &[a, b]).await;
    let order_code = json["data"]["order_code"].as_i64().unwrap();

    // One of the two was settled through another channel in the meantime.
    sqlx::query("UPDATE invoices SET payment_status_id = 3, payment_date = NOW() WHERE id = $1")
        .bind(a)
        .execute(&pool)
        .await
        .unwrap();

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let result = verify(app, &p, order_code).await;

    assert_eq!(result["status"], "SUCCESS");
    assert_eq!(result["updated_invoice_ids"], json!([b]));
    assert_eq!(result["nothing_to_update"], false);
    assert_eq!(result["room_id"], p.room_id);
    assert_eq!(payment_state(&pool, b).await.0, 3);

    // Replaying the confirmation changes nothing.
    let app = common::build_test_app_with_gateway(pool.clone(), gateway);
    let replay = verify(app, &p, order_code).await;

    assert_eq!(replay["status"], "SUCCESS");
    assert_eq!(replay["nothing_to_update"], true);
    assert_eq!(replay["updated_invoice_ids"], json!([]));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn verify_of_unpaid_order_fails_without_changes(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;
    let gateway = StubGateway::new(GatewayStatus::Pending);

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let (_, json) = checkout(app, &p, &[id]).await;
    let order_code = json["data"]["order_code"].as_i64().unwrap();

    let app = common::build_test_app_with_gateway(pool.clone(), Arc::clone(&gateway));
    let result = verify(app, &p, order_code).await;
    assert_eq!(result["status"], "FAILED");
    assert_eq!(payment_state(&pool, id).await.0, 1);

    gateway.set_failing(true);
    let app = common::build_test_app_with_gateway(pool.clone(), gateway);
    let result = verify(app, &p, order_code).await;
    assert_eq!(result["status"], "FAILED");
    assert_eq!(payment_state(&pool, id).await.0, 1);
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn signed_webhook_settles_order(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 300).await;

    let app = common::build_test_app(pool.clone());
    let (_, json) = checkout(app, &p, &[id]).await;
    let order_code = json["data"]["order_code"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/payments/webhook", signed_webhook(order_code, "00")).await;
    let result = expect_data(response, StatusCode::OK).await;

    assert_eq!(result["status"], "SUCCESS");
    assert_eq!(result["updated_invoice_ids"], json!([id]));
    assert_eq!(payment_state(&pool, id).await.0, 3);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn webhook_for_unpaid_order_changes_nothing(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 300).await;

    let app = common::build_test_app(pool.clone());
    let (_, json) = checkout(app, &p, &[id]).await;
    let order_code = json["data"]["order_code"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/payments/webhook", signed_webhook(order_code, "01")).await;
    let result = expect_data(response, StatusCode::OK).await;

    assert_eq!(result["status"], "FAILED");
    assert_eq!(payment_state(&pool, id).await.0, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn tampered_webhook_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 300).await;

    let app = common::build_test_app(pool.clone());
    let (_, json) = checkout(app, &p, &[id]).await;
    let order_code = json["data"]["order_code"].as_i64().unwrap();

    let mut payload = signed_webhook(order_code, "00");
    payload["data"]["amount"] = json!(1);

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/payments/webhook", payload).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(payment_state(&pool, id).await.0, 1);
}

// ---------------------------------------------------------------------------
// Cash
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn reported_cash_is_confirmed_by_manager(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/payments/cash",
        json!({ "invoice_ids": [id] }),
        &p.tenant_token(),
    )
    .await;
    assert_eq!(expect_data(response, StatusCode::OK).await, json!([id]));
    assert_eq!(payment_state(&pool, id).await.0, 2);

    // A waiting invoice cannot enter a gateway checkout.
    let app = common::build_test_app(pool.clone());
    let (status, _) = checkout(app, &p, &[id]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/invoices/{id}/confirm-cash"),
        json!({}),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    assert_eq!(data["payment_status_id"], 3);
    assert_eq!(data["payment_method_id"], 1);
    assert!(data["payment_date"].is_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn rejected_cash_makes_invoice_payable_again(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;

    let app = common::build_test_app(pool.clone());
    post_json_auth(
        app,
        "/api/v1/payments/cash",
        json!({ "invoice_ids": [id] }),
        &p.tenant_token(),
    )
    .await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/invoices/{id}/reject-cash"),
        json!({}),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    assert_eq!(data["payment_status_id"], 1);

    // Nothing is waiting any more.
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/invoices/{id}/confirm-cash"),
        json!({}),
        &p.manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn tenant_cannot_confirm_own_cash(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let id = custom_invoice(&pool, &p, p.room_id, 100).await;

    let app = common::build_test_app(pool.clone());
    post_json_auth(
        app,
        "/api/v1/payments/cash",
        json!({ "invoice_ids": [id] }),
        &p.tenant_token(),
    )
    .await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/invoices/{id}/confirm-cash"),
        json!({}),
        &p.tenant_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(payment_state(&pool, id).await.0, 2);
}
