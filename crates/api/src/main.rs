use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vireo_api::config::{JobStoreKind, ServerConfig};
use vireo_api::{background, routes, state};
use vireo_db::quota_guard::PgQuotaGuard;
use vireo_db::store::{JobStore, MemoryJobStore, PgJobStore};
use vireo_pipeline::{JobRunner, Materializer, Orchestrator, PollPolicy};
use vireo_provider::{GenerationBackend, ProviderAdapter};
use vireo_storage::media::{MediaStorageClient, StorageConfig};
use vireo_storage::ObjectStorage;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vireo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    // Quota rows and entitlements always live in Postgres; only the job
    // store is switchable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = vireo_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    vireo_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    vireo_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Job store ---
    let sweeper_cancel = tokio_util::sync::CancellationToken::new();
    let mut sweeper_handle = None;

    let store: Arc<dyn JobStore> = match config.job_store {
        JobStoreKind::Postgres => {
            tracing::info!("Using persisted job store");
            Arc::new(PgJobStore::new(pool.clone()))
        }
        JobStoreKind::Memory => {
            tracing::info!("Using ephemeral job store");
            let registry = Arc::new(MemoryJobStore::new());

            // The sweeper binds to the concrete registry; it can never
            // touch the persisted table.
            sweeper_handle = Some(tokio::spawn(background::registry_sweeper::run(
                Arc::clone(&registry),
                sweeper_cancel.clone(),
            )));

            registry
        }
    };

    // --- Quota guard ---
    let quota = Arc::new(PgQuotaGuard::new(pool.clone()));

    // --- Provider adapter ---
    let backend: Arc<dyn GenerationBackend> = Arc::new(ProviderAdapter::from_env());

    // --- Durable media storage ---
    let storage: Arc<dyn ObjectStorage> =
        Arc::new(MediaStorageClient::new(StorageConfig::from_env()));

    // --- Generation pipeline ---
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&backend),
        Materializer::new(Arc::clone(&storage), config.spool_dir.clone()),
        quota.clone(),
        PollPolicy::default(),
    );
    let runner = Arc::new(JobRunner::new(Arc::new(orchestrator)));
    tracing::info!("Generation pipeline ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        pool: Some(pool),
        store,
        quota,
        storage,
        runner: Arc::clone(&runner),
    };

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Drain in-flight generation tasks first; they hold spool files and
    // provider operations.
    runner
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Generation pipeline drained");

    sweeper_cancel.cancel();
    if let Some(handle) = sweeper_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Registry sweeper stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
