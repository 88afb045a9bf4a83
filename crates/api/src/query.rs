//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Maximum page size for paginated listings.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for paginated listings.
pub const DEFAULT_LIMIT: i64 = 50;

impl PaginationParams {
    /// Limit clamped to `1..=MAX_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Billing period parameters (`?month=&year=`).
#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    pub month: i16,
    pub year: i32,
}
