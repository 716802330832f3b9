//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - The DTOs used to create or update that entity

pub mod entitlement;
pub mod generation;
pub mod usage;
