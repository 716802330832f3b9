//! Route definitions for the `/usage` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::usage;
use crate::state::AppState;

/// Routes mounted at `/usage`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(usage::get_usage))
}
