//! Handlers for employee lookup and single-record entry.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use roster_core::employee::{Employee, RawRecord, PREFERRED_COUNTRIES};
use roster_core::store::SearchParams;
use roster_core::writer;

use crate::error::AppResult;
use crate::extract::RecordId;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/employees
///
/// Per-field substring filters plus an optional `q` term matched against
/// every field and the id.
pub async fn list_employees(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<DataResponse<Vec<Employee>>>> {
    let mut session = state.store.session().await?;
    let employees = writer::search_employees(session.as_mut(), &params.into_filter()).await?;
    Ok(Json(DataResponse { data: employees }))
}

/// POST /api/v1/employees
///
/// Validate and insert one record. Rejections return 422 with the failing
/// fields.
pub async fn create_employee(
    State(state): State<AppState>,
    Json(input): Json<RawRecord>,
) -> AppResult<(StatusCode, Json<DataResponse<Employee>>)> {
    let mut session = state.store.session().await?;
    let employee = writer::create_employee(session.as_mut(), &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: employee })))
}

/// GET /api/v1/employees/{id}
pub async fn get_employee(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> AppResult<Json<DataResponse<Employee>>> {
    let mut session = state.store.session().await?;
    let employee = writer::find_employee(session.as_mut(), id).await?;
    Ok(Json(DataResponse { data: employee }))
}

/// PUT /api/v1/employees/{id}
///
/// Full replacement: fields missing from the body are cleared.
pub async fn update_employee(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    Json(input): Json<RawRecord>,
) -> AppResult<Json<DataResponse<Employee>>> {
    let mut session = state.store.session().await?;
    let employee = writer::update_employee(session.as_mut(), id, &input).await?;
    Ok(Json(DataResponse { data: employee }))
}

/// DELETE /api/v1/employees/{id}
pub async fn delete_employee(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> AppResult<StatusCode> {
    let mut session = state.store.session().await?;
    writer::delete_employee(session.as_mut(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/employees/countries
pub async fn list_countries() -> Json<DataResponse<&'static [&'static str]>> {
    Json(DataResponse {
        data: PREFERRED_COUNTRIES,
    })
}
