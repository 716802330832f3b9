use std::sync::Arc;

use vireo_core::quota::QuotaGuard;
use vireo_db::store::JobStore;
use vireo_pipeline::JobRunner;
use vireo_storage::ObjectStorage;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Database connection pool; `None` when running purely on the
    /// ephemeral store.
    pub pool: Option<vireo_db::DbPool>,
    /// Job records (persisted or ephemeral, per configuration).
    pub store: Arc<dyn JobStore>,
    /// Admission control and usage accounting.
    pub quota: Arc<dyn QuotaGuard>,
    /// Durable media storage (artifact delete cascade).
    pub storage: Arc<dyn ObjectStorage>,
    /// Background generation pipeline.
    pub runner: Arc<JobRunner>,
}
