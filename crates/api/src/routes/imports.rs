//! Route definitions for batch imports.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::imports;
use crate::state::AppState;

/// Import routes mounted at `/imports`.
///
/// ```text
/// GET    /                  -> list_imports
/// POST   /                  -> start_import
/// GET    /{id}              -> get_import
/// POST   /{id}/cancel       -> cancel_import
/// GET    /{id}/events       -> import_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(imports::list_imports).post(imports::start_import))
        .route("/{id}", get(imports::get_import))
        .route("/{id}/cancel", post(imports::cancel_import))
        .route("/{id}/events", get(imports::import_events))
}
