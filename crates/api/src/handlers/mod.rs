//! Request handlers.
//!
//! Handlers delegate to the job store, quota guard, and pipeline runner
//! from [`crate::state::AppState`] and map errors via
//! [`crate::error::AppError`].

pub mod generations;
pub mod usage;
