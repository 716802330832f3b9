//! Domain rules for the vireo generation platform.
//!
//! This crate holds pure logic only: types, validation, quota policy, and
//! the trait seams the service crates implement. It has no database or
//! network dependencies so every rule here is unit-testable in isolation.

pub mod error;
pub mod generation;
pub mod quota;
pub mod types;
