//! Route definitions for employee records.

use axum::routing::get;
use axum::Router;

use crate::handlers::employees;
use crate::state::AppState;

/// Employee routes mounted at `/employees`.
///
/// ```text
/// GET    /                  -> list_employees
/// POST   /                  -> create_employee
/// GET    /countries         -> list_countries
/// GET    /{id}              -> get_employee
/// PUT    /{id}              -> update_employee
/// DELETE /{id}              -> delete_employee
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/countries", get(employees::list_countries))
        .route(
            "/{id}",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
}
