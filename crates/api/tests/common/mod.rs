#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use roomkeep_api::auth::jwt::{generate_access_token, JwtConfig};
use roomkeep_api::config::{ServerConfig, SweepConfig};
use roomkeep_api::router::build_app_router;
use roomkeep_api::state::AppState;
use roomkeep_core::payment::GatewayStatus;
use roomkeep_core::roles::Role;
use roomkeep_core::types::DbId;
use roomkeep_db::models::house::CreateHouse;
use roomkeep_db::models::room::CreateRoom;
use roomkeep_db::models::service::{CreateRoomService, CreateService};
use roomkeep_db::models::user::CreateUser;
use roomkeep_db::repositories::{HouseRepo, RoomRepo, RoomServiceRepo, ServiceRepo, UserRepo};
use roomkeep_events::EventBus;
use roomkeep_gateway::{CheckoutLink, GatewayConfig, GatewayError, PaymentGateway, PaymentOrder};
use sqlx::PgPool;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const CHECKSUM_KEY: &str = "test-checksum-key";

// ---------------------------------------------------------------------------
// Gateway stub
// ---------------------------------------------------------------------------

/// In-memory [`PaymentGateway`] with a scripted order status.
pub struct StubGateway {
    status: Mutex<GatewayStatus>,
    failing: Mutex<bool>,
    orders: Mutex<Vec<PaymentOrder>>,
}

impl StubGateway {
    pub fn new(status: GatewayStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            failing: Mutex::new(false),
            orders: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: GatewayStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Make every call fail as if the gateway were unreachable.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn orders(&self) -> Vec<PaymentOrder> {
        self.orders.lock().unwrap().clone()
    }

    fn check_up(&self) -> Result<(), GatewayError> {
        if *self.failing.lock().unwrap() {
            return Err(GatewayError::ApiError {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_order(&self, order: &PaymentOrder) -> Result<CheckoutLink, GatewayError> {
        self.check_up()?;
        self.orders.lock().unwrap().push(order.clone());
        Ok(CheckoutLink {
            checkout_url: format!("https://pay.test/{}", order.order_code),
            qr_code: Some(format!("QR{}", order.order_code)),
        })
    }

    async fn get_payment_status(&self, _order_code: i64) -> Result<GatewayStatus, GatewayError> {
        self.check_up()?;
        Ok(*self.status.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        gateway: Some(GatewayConfig {
            base_url: "https://gateway.test".to_string(),
            client_id: "client".to_string(),
            api_key: "api-key".to_string(),
            checksum_key: CHECKSUM_KEY.to_string(),
            return_url: "https://app.test/paid".to_string(),
            cancel_url: "https://app.test/cancelled".to_string(),
            timeout: Duration::from_secs(5),
        }),
        sweep: SweepConfig { enabled: false },
    }
}

/// Full router with a gateway that reports every order as paid.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_gateway(pool, StubGateway::new(GatewayStatus::Paid))
}

pub fn build_test_app_with_gateway(pool: PgPool, gateway: Arc<StubGateway>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
        gateway,
    };
    build_app_router(state, &config)
}

pub fn token_for(user_id: DbId, role: Role) -> String {
    let config = JwtConfig {
        secret: JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, role.as_str(), &config).unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the `data` field of the envelope.
pub async fn expect_data(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

pub async fn create_user(pool: &PgPool, name: &str, role: Role) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: None,
            role_id: role.id(),
        },
    )
    .await
    .unwrap()
    .id
}

/// One house with one room, its manager, an admin and two tenants.
pub struct Property {
    pub admin: DbId,
    pub manager: DbId,
    pub tenant: DbId,
    pub other_tenant: DbId,
    pub house_id: DbId,
    pub room_id: DbId,
}

impl Property {
    pub fn admin_token(&self) -> String {
        token_for(self.admin, Role::Admin)
    }

    pub fn manager_token(&self) -> String {
        token_for(self.manager, Role::Manager)
    }

    pub fn tenant_token(&self) -> String {
        token_for(self.tenant, Role::Tenant)
    }

    pub fn other_tenant_token(&self) -> String {
        token_for(self.other_tenant, Role::Tenant)
    }
}

pub async fn seed_property(pool: &PgPool) -> Property {
    let admin = create_user(pool, "Admin", Role::Admin).await;
    let manager = create_user(pool, "Manager", Role::Manager).await;
    let tenant = create_user(pool, "Tenant One", Role::Tenant).await;
    let other_tenant = create_user(pool, "Tenant Two", Role::Tenant).await;

    let house = HouseRepo::create(
        pool,
        &CreateHouse {
            name: "Riverside".to_string(),
            address: Some("1 River Rd".to_string()),
            manager_id: Some(manager),
        },
    )
    .await
    .unwrap();
    let room_id = create_room(pool, house.id, "101").await;

    Property {
        admin,
        manager,
        tenant,
        other_tenant,
        house_id: house.id,
        room_id,
    }
}

pub async fn create_room(pool: &PgPool, house_id: DbId, name: &str) -> DbId {
    RoomRepo::create(
        pool,
        house_id,
        &CreateRoom {
            name: name.to_string(),
            capacity: Some(2),
            base_price: Some(3_000_000),
            description: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Bind a new catalog service to a room; returns the room service id.
pub async fn bind_service(
    pool: &PgPool,
    room_id: DbId,
    name: &str,
    is_metered: bool,
    price: i64,
) -> DbId {
    let service = ServiceRepo::create(
        pool,
        &CreateService {
            name: name.to_string(),
            unit: if is_metered { "kWh" } else { "month" }.to_string(),
            is_metered: Some(is_metered),
            default_price: Some(price),
        },
    )
    .await
    .unwrap();
    RoomServiceRepo::create(
        pool,
        room_id,
        &CreateRoomService {
            service_id: service.id,
            price: Some(price),
            is_active: Some(true),
            description: None,
        },
    )
    .await
    .unwrap()
    .unwrap()
    .id
}

/// Room status name as stored.
pub async fn room_status(pool: &PgPool, room_id: DbId) -> String {
    sqlx::query_scalar(
        "SELECT s.name FROM rooms r JOIN room_statuses s ON s.id = r.status_id WHERE r.id = $1",
    )
    .bind(room_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Contract status name as stored.
pub async fn contract_status(pool: &PgPool, contract_id: DbId) -> String {
    sqlx::query_scalar(
        "SELECT s.name FROM contracts c JOIN contract_statuses s ON s.id = c.status_id \
         WHERE c.id = $1",
    )
    .bind(contract_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
