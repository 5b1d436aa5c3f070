//! Handlers for background batch imports.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use roster_core::import_source::SourceFormat;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::background::import_jobs::{ImportEvent, ImportRunView};
use crate::error::{AppError, AppResult};
use crate::extract::RecordId;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for starting an import.
#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub format: SourceFormat,
    /// The file contents: CSV text, or a JSON array of row objects.
    pub data: String,
}

/// POST /api/v1/imports
///
/// Start a background import and return its initial view (202).
pub async fn start_import(
    State(state): State<AppState>,
    Json(input): Json<StartImportRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ImportRunView>>)> {
    if input.data.trim().is_empty() {
        return Err(AppError::BadRequest("Import data is empty".to_string()));
    }
    let view = state
        .imports
        .start(state.store.clone(), input.format, input.data)
        .await;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: view })))
}

/// GET /api/v1/imports
pub async fn list_imports(State(state): State<AppState>) -> Json<DataResponse<Vec<ImportRunView>>> {
    Json(DataResponse {
        data: state.imports.list().await,
    })
}

/// GET /api/v1/imports/{id}
pub async fn get_import(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> AppResult<Json<DataResponse<ImportRunView>>> {
    let view = state.imports.get(id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/imports/{id}/cancel
///
/// Nothing from a cancelled run is committed.
pub async fn cancel_import(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> AppResult<(StatusCode, Json<DataResponse<ImportRunView>>)> {
    let view = state.imports.cancel(id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: view })))
}

/// GET /api/v1/imports/{id}/events
///
/// Server-sent events: one `snapshot` event with the current view, then a
/// `progress` event per row and a final `finished` event. The stream ends
/// when the run does.
pub async fn import_events(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (snapshot, receiver) = state.imports.subscribe(id).await?;

    let first = Event::default()
        .event("snapshot")
        .json_data(&snapshot)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let updates = stream::iter(receiver)
        .flat_map(BroadcastStream::new)
        .filter_map(move |message| async move {
            match message {
                Ok(event) => to_sse(&event),
                Err(lagged) => {
                    tracing::debug!(import_id = id, error = %lagged, "Import event subscriber lagged");
                    None
                }
            }
        });

    let events = stream::once(async move { first })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &ImportEvent) -> Option<Event> {
    Event::default().event(event.name()).json_data(event).ok()
}
