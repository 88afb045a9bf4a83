//! Daily contract expiry sweep.
//!
//! Runs once at start-up to catch up on missed days, then every day at
//! 00:00 UTC. Overdue active contracts are renewed or expired by
//! [`contracts::sweep_overdue`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use roomkeep_events::EventBus;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::services::contracts;

/// Time left until the next 00:00 UTC after `now`.
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());
    match next {
        Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 60 * 60),
    }
}

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(pool: PgPool, bus: Arc<EventBus>, cancel: CancellationToken) {
    tracing::info!("Contract sweep job started");
    sweep(&pool, &bus).await;

    loop {
        let wait = until_next_midnight(Utc::now());
        tracing::debug!(wait_secs = wait.as_secs(), "Contract sweep sleeping");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Contract sweep job stopping");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                sweep(&pool, &bus).await;
            }
        }
    }
}

async fn sweep(pool: &PgPool, bus: &EventBus) {
    let today = Utc::now().date_naive();
    match contracts::sweep_overdue(pool, bus, today).await {
        Ok(report) if report.renewed + report.expired + report.failed > 0 => {
            tracing::info!(
                %today,
                renewed = report.renewed,
                expired = report.expired,
                failed = report.failed,
                "Contract sweep finished"
            );
        }
        Ok(_) => tracing::debug!(%today, "Contract sweep: nothing overdue"),
        Err(e) => tracing::error!(error = %e, %today, "Contract sweep failed"),
    }
}
