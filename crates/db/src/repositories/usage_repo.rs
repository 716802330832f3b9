//! Repository for the `usage_counters` table.
//!
//! The counter is read-modify-written without a transaction spanning job
//! completion; concurrent submissions can transiently over-admit and a
//! crash between materialization and recording can under-count. Both are
//! accepted for this non-financial counter.

use sqlx::PgPool;
use vireo_core::quota::PeriodKind;
use vireo_core::types::DbId;

use crate::models::usage::UsageCounter;

/// Column list for `usage_counters` queries.
const COLUMNS: &str =
    "owner_id, capability, period_kind, period_count, last_reset_at, updated_at";

/// Provides read/write access to per-owner usage counters.
pub struct UsageRepo;

impl UsageRepo {
    /// Load the counter for `(owner, capability)`, creating a zeroed row on
    /// first use.
    pub async fn get_or_create(
        pool: &PgPool,
        owner_id: DbId,
        capability: &str,
        period: PeriodKind,
    ) -> Result<UsageCounter, sqlx::Error> {
        let query = format!(
            "INSERT INTO usage_counters (owner_id, capability, period_kind) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (owner_id, capability) \
                 DO UPDATE SET owner_id = usage_counters.owner_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageCounter>(&query)
            .bind(owner_id)
            .bind(capability)
            .bind(period.as_str())
            .fetch_one(pool)
            .await
    }

    /// Zero the counter and stamp a new period start. Called lazily when a
    /// read observes that the period boundary has been crossed.
    pub async fn reset(
        pool: &PgPool,
        owner_id: DbId,
        capability: &str,
    ) -> Result<UsageCounter, sqlx::Error> {
        let query = format!(
            "UPDATE usage_counters \
             SET period_count = 0, last_reset_at = NOW(), updated_at = NOW() \
             WHERE owner_id = $1 AND capability = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageCounter>(&query)
            .bind(owner_id)
            .bind(capability)
            .fetch_one(pool)
            .await
    }

    /// Count one unit of consumed usage.
    pub async fn increment(
        pool: &PgPool,
        owner_id: DbId,
        capability: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE usage_counters \
             SET period_count = period_count + 1, updated_at = NOW() \
             WHERE owner_id = $1 AND capability = $2",
        )
        .bind(owner_id)
        .bind(capability)
        .execute(pool)
        .await?;
        Ok(())
    }
}
