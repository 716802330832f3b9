//! Adapter over the external asynchronous generation service.
//!
//! The service exposes a long-running-operation contract: a submit call
//! returns an operation name, and the operation is polled until `done`.
//! [`adapter::ProviderAdapter`] wraps the wire client with credential
//! failover so the orchestrator stays provider- and credential-agnostic.

pub mod adapter;
pub mod api;

pub use adapter::{GenerationBackend, OperationHandle, OperationsApi, ProviderAdapter};
pub use api::{ArtifactRef, GenerationApi, OperationStatus, ProviderError};
