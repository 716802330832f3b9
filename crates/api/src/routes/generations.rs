//! Route definitions for the `/generations` resource.
//!
//! All endpoints require authentication.

use axum::routing::get;
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// GET    /        -> list_generations
/// POST   /        -> submit_generation
/// GET    /{id}    -> get_generation
/// DELETE /{id}    -> delete_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(generations::list_generations).post(generations::submit_generation),
        )
        .route(
            "/{id}",
            get(generations::get_generation).delete(generations::delete_generation),
        )
}
