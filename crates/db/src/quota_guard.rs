//! Postgres-backed [`QuotaGuard`]: plan resolution, lazy period reset,
//! and usage accounting over the repositories.

use vireo_core::error::CoreError;
use vireo_core::quota::{
    effective_plan, needs_reset, plan_limits, QuotaGuard, UsageSnapshot,
};
use vireo_core::types::DbId;

use crate::models::usage::UsageCounter;
use crate::repositories::{EntitlementRepo, UsageRepo};
use crate::DbPool;

/// Quota guard over the `entitlements` and `usage_counters` tables.
pub struct PgQuotaGuard {
    pool: DbPool,
}

impl PgQuotaGuard {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve the owner's effective plan from their latest entitlement.
    async fn resolve_plan(&self, owner: DbId) -> Result<String, CoreError> {
        let latest = EntitlementRepo::latest_for_owner(&self.pool, owner)
            .await
            .map_err(internal)?;
        Ok(effective_plan(
            latest.map(|e| e.view()).as_ref(),
            chrono::Utc::now(),
        ))
    }

    /// Load the counter, resetting it first if its period boundary has been
    /// crossed since the last reset.
    async fn current_counter(
        &self,
        owner: DbId,
        capability: &str,
        period: vireo_core::quota::PeriodKind,
    ) -> Result<UsageCounter, CoreError> {
        let counter = UsageRepo::get_or_create(&self.pool, owner, capability, period)
            .await
            .map_err(internal)?;

        if needs_reset(period, counter.last_reset_at, chrono::Utc::now()) {
            UsageRepo::reset(&self.pool, owner, capability)
                .await
                .map_err(internal)
        } else {
            Ok(counter)
        }
    }
}

#[async_trait::async_trait]
impl QuotaGuard for PgQuotaGuard {
    async fn check_allowed(
        &self,
        owner: DbId,
        capability: &str,
    ) -> Result<UsageSnapshot, CoreError> {
        let plan = self.resolve_plan(owner).await?;
        let limits = plan_limits(&plan, capability);

        // Unbounded tiers never touch the counter.
        let Some(capacity) = limits.capacity_per_period else {
            return Ok(UsageSnapshot::unlimited(plan));
        };

        let counter = self.current_counter(owner, capability, limits.period).await?;

        Ok(UsageSnapshot {
            allowed: counter.period_count < capacity,
            used: counter.period_count,
            limit: Some(capacity),
            plan,
            unlimited: false,
        })
    }

    async fn record_usage(&self, owner: DbId, capability: &str) -> Result<(), CoreError> {
        let plan = self.resolve_plan(owner).await?;
        let limits = plan_limits(&plan, capability);

        if !limits.tracked() {
            return Ok(());
        }

        // Same lazy reset as the check path, so an increment straddling a
        // period boundary lands in the new period.
        self.current_counter(owner, capability, limits.period).await?;
        UsageRepo::increment(&self.pool, owner, capability)
            .await
            .map_err(internal)
    }
}

fn internal(err: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("quota storage error: {err}"))
}
