pub mod employees;
pub mod health;
pub mod imports;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /employees                       search, create
/// /employees/countries             preferred country list
/// /employees/{id}                  get, replace, delete
///
/// /imports                         list, start
/// /imports/{id}                    status and accounting
/// /imports/{id}/cancel             cancel a running import (POST)
/// /imports/{id}/events             progress stream (SSE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/employees", employees::router())
        .nest("/imports", imports::router())
}
