//! Repository for the `entitlements` table (read-only in this subsystem).

use sqlx::PgPool;
use vireo_core::types::DbId;

use crate::models::entitlement::Entitlement;

/// Column list for `entitlements` queries.
const COLUMNS: &str = "id, owner_id, plan, status, is_lifetime, expires_at, created_at";

/// Read access to plan entitlements.
pub struct EntitlementRepo;

impl EntitlementRepo {
    /// The owner's most recent entitlement row, if any. Plan resolution
    /// (expiry, lifetime precedence) happens in `vireo_core::quota`.
    pub async fn latest_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Option<Entitlement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM entitlements \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Entitlement>(&query)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }
}
