pub mod generations;
pub mod health;
pub mod usage;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generations            submit (POST), list (GET)
/// /generations/{id}       get (GET), delete (DELETE)
/// /usage                  usage snapshot (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generations::router())
        .nest("/usage", usage::router())
}
