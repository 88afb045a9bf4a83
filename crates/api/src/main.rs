use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomkeep_gateway::{DisabledGateway, HttpPaymentGateway, PaymentGateway};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomkeep_api::background::contract_sweep;
use roomkeep_api::config::ServerConfig;
use roomkeep_api::notifications::NotificationRouter;
use roomkeep_api::router::build_app_router;
use roomkeep_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomkeep_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = roomkeep_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    roomkeep_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    roomkeep_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Payment gateway ---
    let gateway: Arc<dyn PaymentGateway> = match &config.gateway {
        Some(gateway_config) => {
            tracing::info!(base_url = %gateway_config.base_url, "Payment gateway configured");
            Arc::new(
                HttpPaymentGateway::new(gateway_config.clone())
                    .expect("Failed to build payment gateway client"),
            )
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, online payments are disabled");
            Arc::new(DisabledGateway)
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(roomkeep_events::EventBus::default());
    tracing::info!("Event bus created");

    let notification_router = NotificationRouter::new(pool.clone());
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));

    // --- Background jobs ---
    let cancel = CancellationToken::new();
    let sweep_handle = if config.sweep.enabled {
        Some(tokio::spawn(contract_sweep::run(
            pool.clone(),
            Arc::clone(&event_bus),
            cancel.clone(),
        )))
    } else {
        tracing::info!("Contract sweep disabled");
        None
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        gateway,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(grace, handle).await;
        tracing::info!("Contract sweep stopped");
    }

    // Dropping the last sender closes the channel and ends the router loop.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, router_handle).await;
    tracing::info!("Notification router shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
