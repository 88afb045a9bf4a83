//! HTTP-level integration tests for custom invoices and invoice editing.

mod common;

use axum::http::StatusCode;
use common::{
    bind_service, body_json, delete_auth, expect_data, get_auth, post_json_auth, put_json_auth,
    seed_property, Property,
};
use serde_json::{json, Value};
use sqlx::PgPool;

async fn create_invoice(pool: &PgPool, p: &Property, items: Value) -> Value {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/invoices", p.room_id),
        json!({ "month": 2, "year": 2026, "description": "February extras", "items": items }),
        &p.manager_token(),
    )
    .await;
    expect_data(response, StatusCode::CREATED).await
}

async fn edit_invoice(pool: &PgPool, p: &Property, id: i64, body: Value) -> (StatusCode, Value) {
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/invoices/{id}"),
        body,
        &p.manager_token(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

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

// ---------------------------------------------------------------------------
// Custom invoices
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn custom_invoice_total_is_sum_of_items(pool: PgPool) {
    let p = seed_property(&pool).await;

    let invoice = create_invoice(
        &pool,
        &p,
        json!([
            { "description": "Key replacement", "amount": 150_000 },
            { "description": "  Late fee  ", "amount": 50_000 },
        ]),
    )
    .await;

    assert_eq!(invoice["invoice_type"], "custom");
    assert_eq!(invoice["total_amount"], 200_000);
    assert_eq!(invoice["payment_status_id"], 1);
    let items = invoice["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|i| i["description"] == "Late fee"));
    assert!(items.iter().all(|i| i["source_type"] == "manual"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn custom_invoice_needs_items(pool: PgPool) {
    let p = seed_property(&pool).await;
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/invoices", p.room_id),
        json!({ "month": 2, "year": 2026, "items": [] }),
        &p.manager_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["field"], "items");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn negative_item_amount_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/invoices", p.room_id),
        json!({ "month": 2, "year": 2026, "items": [{ "description": "Refund", "amount": -1 }] }),
        &p.manager_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["field"], "amount");
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn edit_updates_deletes_and_adds_manual_items(pool: PgPool) {
    let p = seed_property(&pool).await;
    let invoice = create_invoice(
        &pool,
        &p,
        json!([
            { "description": "Keep me", "amount": 100 },
            { "description": "Drop me", "amount": 200 },
        ]),
    )
    .await;
    let id = invoice["id"].as_i64().unwrap();
    let keep_id = invoice["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["description"] == "Keep me")
        .unwrap()["id"]
        .clone();

    let (status, json) = edit_invoice(
        &pool,
        &p,
        id,
        json!({
            "description": "Revised",
            "items": [
                { "id": keep_id, "description": "Kept and repriced", "amount": 300 },
                { "description": "Brand new", "amount": 400 },
            ],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["description"], "Revised");
    assert_eq!(data["total_amount"], 700);
    let descriptions: Vec<&str> = data["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["description"].as_str().unwrap())
        .collect();
    assert_eq!(descriptions.len(), 2);
    assert!(descriptions.contains(&"Kept and repriced"));
    assert!(descriptions.contains(&"Brand new"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn edit_with_foreign_item_id_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;
    let first = create_invoice(&pool, &p, json!([{ "description": "A", "amount": 1 }])).await;
    let second = create_invoice(&pool, &p, json!([{ "description": "B", "amount": 2 }])).await;
    let foreign_item = second["items"][0]["id"].clone();

    let (status, _) = edit_invoice(
        &pool,
        &p,
        first["id"].as_i64().unwrap(),
        json!({ "items": [{ "id": foreign_item, "description": "Hijack", "amount": 5 }] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn removing_every_item_deletes_invoice(pool: PgPool) {
    let p = seed_property(&pool).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Only", "amount": 10 }])).await;
    let id = invoice["id"].as_i64().unwrap();

    let (status, json) = edit_invoice(&pool, &p, id, json!({ "items": [] })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!({ "deleted": true, "id": id }));

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &format!("/api/v1/invoices/{id}"), &p.manager_token()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleting_service_usage_from_invoice(pool: PgPool) {
    let p = seed_property(&pool).await;
    let electricity = bind_service(&pool, p.room_id, "Electricity", true, 1_000).await;
    let internet = bind_service(&pool, p.room_id, "Internet", false, 5_000).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/service-usage", p.room_id),
        json!({
            "month": 4,
            "year": 2026,
            "services": [
                { "room_service_id": electricity, "usage_value": 10 },
                { "room_service_id": internet, "usage_value": 1 },
            ],
        }),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    let invoice_id = data["invoice"]["id"].as_i64().unwrap();
    let electricity_usage = data["usages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["room_service_id"] == electricity)
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, json) = edit_invoice(
        &pool,
        &p,
        invoice_id,
        json!({ "delete_service_usage_ids": [electricity_usage] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_amount"], 5_000);
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM service_usage WHERE id = $1")
        .bind(electricity_usage)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleting_unrelated_service_usage_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;

    let (status, json) = edit_invoice(
        &pool,
        &p,
        invoice["id"].as_i64().unwrap(),
        json!({ "delete_service_usage_ids": [999_999] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "delete_service_usage_ids");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn custom_invoice_cannot_drop_service_usage(pool: PgPool) {
    let p = seed_property(&pool).await;
    let electricity = bind_service(&pool, p.room_id, "Electricity", true, 1_000).await;
    let internet = bind_service(&pool, p.room_id, "Internet", false, 5_000).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/service-usage", p.room_id),
        json!({
            "month": 4,
            "year": 2026,
            "services": [
                { "room_service_id": electricity, "usage_value": 10 },
                { "room_service_id": internet, "usage_value": 1 },
            ],
        }),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    let usage_invoice_id = data["invoice"]["id"].as_i64().unwrap();
    let electricity_usage = data["usages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["room_service_id"] == electricity)
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    sqlx::query("UPDATE invoices SET payment_status_id = 3, payment_date = NOW() WHERE id = $1")
        .bind(usage_invoice_id)
        .execute(&pool)
        .await
        .unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/invoices", p.room_id),
        json!({ "month": 4, "year": 2026, "items": [{ "description": "Repairs", "amount": 700 }] }),
        &p.manager_token(),
    )
    .await;
    let custom = expect_data(response, StatusCode::CREATED).await;

    let (status, json) = edit_invoice(
        &pool,
        &p,
        custom["id"].as_i64().unwrap(),
        json!({ "delete_service_usage_ids": [electricity_usage] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "delete_service_usage_ids");

    let (total, items_sum, items): (i64, i64, i64) = sqlx::query_as(
        "SELECT i.total_amount, COALESCE(SUM(ii.amount), 0)::BIGINT, COUNT(ii.id) \
         FROM invoices i LEFT JOIN invoice_items ii ON ii.invoice_id = i.id \
         WHERE i.id = $1 GROUP BY i.id",
    )
    .bind(usage_invoice_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(total, 15_000);
    assert_eq!(items_sum, total);
    assert_eq!(items, 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn paid_invoice_cannot_be_edited_or_deleted(pool: PgPool) {
    let p = seed_property(&pool).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;
    let id = invoice["id"].as_i64().unwrap();
    sqlx::query("UPDATE invoices SET payment_status_id = 3, payment_date = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, _) = edit_invoice(&pool, &p, id, json!({ "description": "Too late" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &format!("/api/v1/invoices/{id}"), &p.manager_token()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unpaid_invoice_can_be_deleted(pool: PgPool) {
    let p = seed_property(&pool).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;
    let id = invoice["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &format!("/api/v1/invoices/{id}"), &p.manager_token()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn tenants_see_invoices_of_rented_room_only(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;
    let uri = format!("/api/v1/invoices/{}", invoice["id"]);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &p.tenant_token()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &p.other_tenant_token()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/invoices", &p.tenant_token()).await;
    let data = expect_data(response, StatusCode::OK).await;
    assert_eq!(data.as_array().unwrap().len(), 1);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/invoices", &p.other_tenant_token()).await;
    let data = expect_data(response, StatusCode::OK).await;
    assert!(data.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn tenant_cannot_edit_invoice(pool: PgPool) {
    let p = seed_property(&pool).await;
    rent_room(&pool, &p).await;
    let invoice = create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/invoices/{}", invoice["id"]),
        json!({ "description": "Discount please" }),
        &p.tenant_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn invoice_list_filters_by_period(pool: PgPool) {
    let p = seed_property(&pool).await;
    create_invoice(&pool, &p, json!([{ "description": "Fee", "amount": 10 }])).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/invoices?month=2&year=2026", &p.admin_token()).await;
    let data = expect_data(response, StatusCode::OK).await;
    assert_eq!(data.as_array().unwrap().len(), 1);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/invoices?month=3&year=2026", &p.admin_token()).await;
    let data = expect_data(response, StatusCode::OK).await;
    assert!(data.as_array().unwrap().is_empty());
}
