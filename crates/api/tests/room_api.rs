//! HTTP-level integration tests for room status changes, the contract
//! cascade they trigger, and room service bindings.

mod common;

use axum::http::StatusCode;
use common::{
    bind_service, body_json, contract_status, delete_auth, expect_data, get_auth, post_json_auth,
    put_json_auth, room_status, seed_property, Property,
};
use serde_json::{json, Value};
use sqlx::PgPool;

async fn active_contract(pool: &PgPool, p: &Property) -> i64 {
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
    expect_data(response, StatusCode::CREATED).await["id"]
        .as_i64()
        .unwrap()
}

async fn change_status(pool: &PgPool, p: &Property, status: &str) -> (StatusCode, Value) {
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/rooms/{}/status", p.room_id),
        json!({ "status": status }),
        &p.manager_token(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Status cascade
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn maintenance_terminates_active_contract(pool: PgPool) {
    let p = seed_property(&pool).await;
    let contract_id = active_contract(&pool, &p).await;
    assert_eq!(room_status(&pool, p.room_id).await, "used");

    let (status, json) = change_status(&pool, &p, "maintenance").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["closed_contract_ids"], json!([contract_id]));
    assert!(json["data"]["warnings"].as_array().unwrap().is_empty());
    assert_eq!(room_status(&pool, p.room_id).await, "maintenance");
    assert_eq!(contract_status(&pool, contract_id).await, "terminated");

    let reason: Option<String> =
        sqlx::query_scalar("SELECT termination_reason FROM contracts WHERE id = $1")
            .bind(contract_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(reason.is_some_and(|r| !r.is_empty()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failed_cascade_keeps_room_change_and_reports_warning(pool: PgPool) {
    let p = seed_property(&pool).await;
    let contract_id = active_contract(&pool, &p).await;

    sqlx::query(
        "CREATE FUNCTION reject_contract_updates() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'contracts are read-only'; END $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER trg_contracts_read_only BEFORE UPDATE ON contracts \
         FOR EACH ROW EXECUTE FUNCTION reject_contract_updates()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (status, json) = change_status(&pool, &p, "maintenance").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["closed_contract_ids"], json!([]));
    let warnings = json["data"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains(&p.room_id.to_string()));
    assert_eq!(room_status(&pool, p.room_id).await, "maintenance");
    assert_eq!(contract_status(&pool, contract_id).await, "active");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn making_room_available_expires_active_contract(pool: PgPool) {
    let p = seed_property(&pool).await;
    let contract_id = active_contract(&pool, &p).await;

    let (status, _) = change_status(&pool, &p, "available").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(room_status(&pool, p.room_id).await, "available");
    assert_eq!(contract_status(&pool, contract_id).await, "expired");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn used_status_cannot_be_set_by_hand(pool: PgPool) {
    let p = seed_property(&pool).await;

    let (status, json) = change_status(&pool, &p, "used").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "status");
    assert_eq!(room_status(&pool, p.room_id).await, "available");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_room_status_is_rejected(pool: PgPool) {
    let p = seed_property(&pool).await;

    let (status, json) = change_status(&pool, &p, "demolished").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "status");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn tenant_cannot_change_room_status(pool: PgPool) {
    let p = seed_property(&pool).await;
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/rooms/{}/status", p.room_id),
        json!({ "status": "maintenance" }),
        &p.tenant_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn room_with_active_contract_cannot_be_deleted(pool: PgPool) {
    let p = seed_property(&pool).await;
    active_contract(&pool, &p).await;

    let app = common::build_test_app(pool.clone());
    let response =
        delete_auth(app, &format!("/api/v1/rooms/{}", p.room_id), &p.manager_token()).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn vacant_room_can_be_deleted(pool: PgPool) {
    let p = seed_property(&pool).await;

    let app = common::build_test_app(pool.clone());
    let response =
        delete_auth(app, &format!("/api/v1/rooms/{}", p.room_id), &p.manager_token()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &format!("/api/v1/rooms/{}", p.room_id), &p.admin_token()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn tenant_sees_only_rented_room(pool: PgPool) {
    let p = seed_property(&pool).await;
    active_contract(&pool, &p).await;
    let uri = format!("/api/v1/rooms/{}", p.room_id);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &p.tenant_token()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &p.other_tenant_token()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Service bindings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn bound_services_are_listed_and_removable(pool: PgPool) {
    let p = seed_property(&pool).await;
    let electricity = bind_service(&pool, p.room_id, "Electricity", true, 3_500).await;
    bind_service(&pool, p.room_id, "Internet", false, 100_000).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/rooms/{}/services", p.room_id),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    assert_eq!(data.as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(
        app,
        &format!("/api/v1/rooms/{}/services/{electricity}", p.room_id),
        &p.manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/rooms/{}/services", p.room_id),
        &p.manager_token(),
    )
    .await;
    let data = expect_data(response, StatusCode::OK).await;
    let names: Vec<&str> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["service_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Internet"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn binding_uses_catalog_price_by_default(pool: PgPool) {
    let p = seed_property(&pool).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/services",
        json!({ "name": "Water", "unit": "m3", "is_metered": true, "default_price": 18_000 }),
        &p.admin_token(),
    )
    .await;
    let service = expect_data(response, StatusCode::CREATED).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/rooms/{}/services", p.room_id),
        json!({ "service_id": service["id"] }),
        &p.manager_token(),
    )
    .await;
    let binding = expect_data(response, StatusCode::CREATED).await;

    assert_eq!(binding["price"], 18_000);
    assert_eq!(binding["is_active"], true);
    assert_eq!(binding["service_name"], "Water");
}
