//! Usage-counter entity for quota accounting.

use serde::Serialize;
use sqlx::FromRow;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `usage_counters` table, keyed by `(owner_id, capability)`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageCounter {
    pub owner_id: DbId,
    pub capability: String,
    pub period_kind: String,
    pub period_count: i64,
    pub last_reset_at: Timestamp,
    pub updated_at: Timestamp,
}
