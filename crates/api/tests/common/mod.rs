//! Shared test harness: builds the full application router with the same
//! middleware stack production uses, backed by the ephemeral job store and
//! in-process fakes for the provider, storage, and quota seams. No
//! database or external service is required.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use vireo_api::auth::jwt::{generate_access_token, JwtConfig};
use vireo_api::config::{JobStoreKind, ServerConfig};
use vireo_api::routes;
use vireo_api::state::AppState;
use vireo_core::error::CoreError;
use vireo_core::generation::GenerationRequest;
use vireo_core::quota::{QuotaGuard, UsageSnapshot};
use vireo_core::types::DbId;
use vireo_db::store::MemoryJobStore;
use vireo_pipeline::{JobRunner, Materializer, Orchestrator, PollPolicy};
use vireo_provider::{
    ArtifactRef, GenerationBackend, OperationHandle, OperationStatus, ProviderError,
};
use vireo_storage::{ArtifactMetadata, ObjectStorage, StorageError, StoredArtifact};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Quota guard with a scripted snapshot; counts `record_usage` calls.
pub struct FakeQuota {
    pub snapshot: UsageSnapshot,
    pub recorded: AtomicUsize,
}

impl FakeQuota {
    /// Tracked plan with the given usage state.
    pub fn tracked(used: i64, limit: i64) -> Self {
        Self {
            snapshot: UsageSnapshot {
                allowed: used < limit,
                used,
                limit: Some(limit),
                plan: "free".to_string(),
                unlimited: false,
            },
            recorded: AtomicUsize::new(0),
        }
    }

    /// Untracked plan: everything allowed, nothing counted.
    pub fn unlimited() -> Self {
        Self {
            snapshot: UsageSnapshot::unlimited("pro".to_string()),
            recorded: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl QuotaGuard for FakeQuota {
    async fn check_allowed(
        &self,
        _owner: DbId,
        _capability: &str,
    ) -> Result<UsageSnapshot, CoreError> {
        Ok(self.snapshot.clone())
    }

    async fn record_usage(&self, _owner: DbId, _capability: &str) -> Result<(), CoreError> {
        self.recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Generation backend scripted per test.
pub struct FakeBackend {
    /// `Some(n)` completes after `n` polls; `None` never completes.
    pub completes_after: Option<u32>,
    /// Artifact URI handed out on completion.
    pub artifact_uri: String,
    pub polls: AtomicU32,
}

impl FakeBackend {
    pub fn completing(artifact_uri: &str) -> Self {
        Self {
            completes_after: Some(1),
            artifact_uri: artifact_uri.to_string(),
            polls: AtomicU32::new(0),
        }
    }

    pub fn never_completing() -> Self {
        Self {
            completes_after: None,
            artifact_uri: String::new(),
            polls: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl GenerationBackend for FakeBackend {
    async fn submit(&self, _request: &GenerationRequest) -> Result<OperationHandle, ProviderError> {
        Ok(OperationHandle::new("operations/test"))
    }

    async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let done = self.completes_after.is_some_and(|n| seen >= n);
        Ok(OperationStatus {
            done,
            artifact: done.then(|| ArtifactRef {
                uri: self.artifact_uri.clone(),
                mime_type: Some("video/mp4".to_string()),
            }),
        })
    }
}

/// Storage fake recording uploads and deletes.
#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_video(
        &self,
        _local_path: &std::path::Path,
        public_id: &str,
    ) -> Result<StoredArtifact, StorageError> {
        self.uploads.lock().unwrap().push(public_id.to_string());
        Ok(StoredArtifact {
            url: format!("https://media.example.com/video/upload/{public_id}.mp4"),
            metadata: ArtifactMetadata {
                bytes: Some(13),
                format: Some("mp4".to_string()),
                width: Some(1280),
                height: Some(720),
                duration_secs: Some(8.0),
            },
        })
    }

    async fn derive_thumbnail(
        &self,
        public_id: &str,
        _offset_secs: u32,
    ) -> Result<String, StorageError> {
        Ok(format!(
            "https://media.example.com/video/upload/{public_id}.jpg"
        ))
    }

    async fn delete(&self, public_id: &str, resource_type: &str) -> Result<(), StorageError> {
        self.deletes
            .lock()
            .unwrap()
            .push((public_id.to_string(), resource_type.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub const TEST_JWT_SECRET: &str = "integration-test-secret-with-plenty-of-entropy";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(spool_dir: std::path::PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        job_store: JobStoreKind::Memory,
        spool_dir,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Everything a test needs to drive the app and inspect its state.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryJobStore>,
    pub quota: Arc<FakeQuota>,
    pub storage: Arc<FakeStorage>,
    pub runner: Arc<JobRunner>,
    _spool: tempfile::TempDir,
}

/// Build the full application router with all middleware layers over the
/// given backend and quota fakes.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses, with a fast poll policy so
/// background jobs settle in milliseconds.
pub fn build_test_app(backend: Arc<dyn GenerationBackend>, quota: FakeQuota) -> TestApp {
    let spool = tempfile::tempdir().expect("spool dir");
    let config = test_config(spool.path().to_path_buf());

    let store = Arc::new(MemoryJobStore::new());
    let quota = Arc::new(quota);
    let storage = Arc::new(FakeStorage::default());

    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as _,
        backend,
        Materializer::new(Arc::clone(&storage) as _, spool.path().to_path_buf()),
        Arc::clone(&quota) as _,
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 3,
        },
    );
    let runner = Arc::new(JobRunner::new(Arc::new(orchestrator)));

    let state = AppState {
        config: Arc::new(config),
        pool: None,
        store: Arc::clone(&store) as _,
        quota: Arc::clone(&quota) as _,
        storage: Arc::clone(&storage) as _,
        runner: Arc::clone(&runner),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        app,
        store,
        quota,
        storage,
        runner,
        _spool: spool,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Mint a Bearer token for `user_id` with the test secret.
pub fn auth_token(user_id: DbId) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 60,
    };
    generate_access_token(user_id, &config).expect("token generation")
}

/// Issue an authenticated GET.
pub async fn get(app: Router, path: &str, user_id: DbId) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {}", auth_token(user_id)))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Issue an authenticated POST with a JSON body.
pub async fn post_json(
    app: Router,
    path: &str,
    user_id: DbId,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {}", auth_token(user_id)))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Issue an authenticated DELETE.
pub async fn delete(app: Router, path: &str, user_id: DbId) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(path)
        .header(AUTHORIZATION, format!("Bearer {}", auth_token(user_id)))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Issue an unauthenticated GET.
pub async fn get_anonymous(app: Router, path: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body must be JSON")
}

/// Spin-wait until the job identified by `id` reaches a terminal status,
/// polling through the public API like a real client would.
pub async fn wait_for_terminal(
    app: &Router,
    id: &str,
    user_id: DbId,
) -> serde_json::Value {
    for _ in 0..200 {
        let response = get(app.clone(), &format!("/api/v1/generations/{id}"), user_id).await;
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached a terminal status");
}

/// Serve fixed bytes over HTTP so the materializer has a real artifact to
/// download.
pub async fn spawn_artifact_server() -> String {
    let app = Router::new().route(
        "/artifact.mp4",
        axum::routing::get(|| async { b"fake mp4 data".to_vec() }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/artifact.mp4")
}
