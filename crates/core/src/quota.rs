//! Plan tiers, usage-period policy, and the quota-guard seam.
//!
//! Enforcement is advisory at write time: the storage layer never hard-caps
//! a counter, and the counter has no transactional link to job completion.
//! These are accepted weak-consistency behaviors for a non-financial counter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Plan tiers
// ---------------------------------------------------------------------------

pub const PLAN_FREE: &str = "free";
pub const PLAN_STARTER: &str = "starter";
pub const PLAN_PRO: &str = "pro";
pub const PLAN_TEAM: &str = "team";
pub const PLAN_LIFETIME: &str = "lifetime";

/// Entitlement status that grants its plan tier.
pub const ENTITLEMENT_ACTIVE: &str = "active";

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// AI media generation, limited per day on tracked tiers.
pub const CAPABILITY_AI_GENERATION: &str = "ai-generation";

/// Video render/export, limited per month on tracked tiers.
pub const CAPABILITY_VIDEO_RENDER: &str = "video-render";

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// Usage accounting window for a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Monthly,
}

impl PeriodKind {
    /// Database/text representation.
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily",
            PeriodKind::Monthly => "monthly",
        }
    }

    /// Parse the text representation, defaulting unknown values to daily.
    pub fn parse(value: &str) -> Self {
        match value {
            "monthly" => PeriodKind::Monthly,
            _ => PeriodKind::Daily,
        }
    }
}

/// Decide whether a counter's period boundary has been crossed since its
/// last reset. Daily counters reset on a calendar-date change, monthly
/// counters on a month or year change -- both observed lazily on the next
/// read, never by a scheduled task.
pub fn needs_reset(period: PeriodKind, last_reset: Timestamp, now: Timestamp) -> bool {
    use chrono::Datelike;
    match period {
        PeriodKind::Daily => now.date_naive() != last_reset.date_naive(),
        PeriodKind::Monthly => {
            now.month() != last_reset.month() || now.year() != last_reset.year()
        }
    }
}

// ---------------------------------------------------------------------------
// Plan limits
// ---------------------------------------------------------------------------

/// Static per-plan configuration for one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Usage ceiling per period. `None` means the tier is unbounded and
    /// skips tracking entirely.
    pub capacity_per_period: Option<i64>,
    pub period: PeriodKind,
}

impl PlanLimits {
    /// Whether usage on this tier is counted at all.
    pub fn tracked(&self) -> bool {
        self.capacity_per_period.is_some()
    }
}

/// Look up the limits for a plan tier and capability.
///
/// Unknown plans are treated as `free`. Unknown capabilities are untracked:
/// only capabilities named here carry a ceiling.
pub fn plan_limits(plan: &str, capability: &str) -> PlanLimits {
    let (capacity, period) = match capability {
        CAPABILITY_AI_GENERATION => {
            let capacity = match plan {
                PLAN_STARTER => Some(20),
                PLAN_PRO | PLAN_TEAM | PLAN_LIFETIME => None,
                _ => Some(5),
            };
            (capacity, PeriodKind::Daily)
        }
        CAPABILITY_VIDEO_RENDER => {
            let capacity = match plan {
                PLAN_STARTER => Some(30),
                PLAN_PRO | PLAN_TEAM | PLAN_LIFETIME => None,
                _ => Some(5),
            };
            (capacity, PeriodKind::Monthly)
        }
        _ => (None, PeriodKind::Daily),
    };

    PlanLimits {
        capacity_per_period: capacity,
        period,
    }
}

// ---------------------------------------------------------------------------
// Entitlement resolution
// ---------------------------------------------------------------------------

/// The fields of an entitlement row needed to resolve a plan tier.
#[derive(Debug, Clone)]
pub struct EntitlementView {
    pub plan: String,
    pub status: String,
    pub is_lifetime: bool,
    pub expires_at: Option<Timestamp>,
}

/// Resolve the effective plan from the owner's most recent entitlement.
///
/// A lifetime entitlement always wins. Otherwise the entitlement must be
/// active and unexpired; anything else falls back to the free tier.
pub fn effective_plan(latest: Option<&EntitlementView>, now: Timestamp) -> String {
    let Some(entitlement) = latest else {
        return PLAN_FREE.to_string();
    };

    if entitlement.is_lifetime {
        return PLAN_LIFETIME.to_string();
    }

    let expired = entitlement.expires_at.is_some_and(|at| at <= now);
    if entitlement.status == ENTITLEMENT_ACTIVE && !expired {
        entitlement.plan.clone()
    } else {
        PLAN_FREE.to_string()
    }
}

// ---------------------------------------------------------------------------
// Usage snapshot
// ---------------------------------------------------------------------------

/// Result of a quota check, also embedded in quota-exceeded errors so the
/// caller sees exactly where they stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub allowed: bool,
    pub used: i64,
    /// `None` on unbounded tiers.
    pub limit: Option<i64>,
    pub plan: String,
    pub unlimited: bool,
}

impl UsageSnapshot {
    /// Snapshot for an untracked tier: always allowed, nothing counted.
    pub fn unlimited(plan: String) -> Self {
        Self {
            allowed: true,
            used: 0,
            limit: None,
            plan,
            unlimited: true,
        }
    }

    /// Usage still available in the current period (0 on unbounded tiers
    /// is never reported; they short-circuit to [`UsageSnapshot::unlimited`]).
    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (limit - self.used).max(0))
    }
}

impl fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "{} of {} used on plan {}", self.used, limit, self.plan),
            None => write!(f, "unlimited on plan {}", self.plan),
        }
    }
}

// ---------------------------------------------------------------------------
// Quota guard seam
// ---------------------------------------------------------------------------

/// Admission control against per-plan usage ceilings.
///
/// Implementations perform the lazy period reset described on
/// [`needs_reset`] before evaluating or incrementing the counter.
#[async_trait::async_trait]
pub trait QuotaGuard: Send + Sync {
    /// Whether the owner may consume one unit of `capability` right now.
    async fn check_allowed(
        &self,
        owner: DbId,
        capability: &str,
    ) -> Result<UsageSnapshot, CoreError>;

    /// Count one unit of consumed usage. No-op on untracked tiers.
    async fn record_usage(&self, owner: DbId, capability: &str) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
