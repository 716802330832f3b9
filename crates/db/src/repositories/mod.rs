//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod entitlement_repo;
pub mod generation_repo;
pub mod usage_repo;

pub use entitlement_repo::EntitlementRepo;
pub use generation_repo::GenerationRepo;
pub use usage_repo::UsageRepo;
