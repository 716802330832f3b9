//! Plan entitlement entity. Rows are written by the billing integration;
//! this subsystem only reads them to resolve the effective plan tier.

use serde::Serialize;
use sqlx::FromRow;
use vireo_core::quota::EntitlementView;
use vireo_core::types::{DbId, Timestamp};

/// A row from the `entitlements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Entitlement {
    pub id: DbId,
    pub owner_id: DbId,
    pub plan: String,
    pub status: String,
    pub is_lifetime: bool,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Entitlement {
    /// Project the fields plan resolution cares about.
    pub fn view(&self) -> EntitlementView {
        EntitlementView {
            plan: self.plan.clone(),
            status: self.status.clone(),
            is_lifetime: self.is_lifetime,
            expires_at: self.expires_at,
        }
    }
}
