//! Background generation pipeline.
//!
//! [`runner::JobRunner`] receives accepted jobs from the submission
//! handler and spawns one tracked task per job. Each task drives
//! [`orchestrator::Orchestrator`], the state machine that submits to the
//! provider, polls to completion, materializes the artifact, and records
//! usage -- catching every failure into the job record rather than
//! propagating it.

pub mod materializer;
pub mod orchestrator;
pub mod poll;
pub mod runner;

pub use materializer::{MaterializeError, Materialized, Materializer};
pub use orchestrator::Orchestrator;
pub use poll::{poll_until_complete, PollError, PollPolicy};
pub use runner::JobRunner;
