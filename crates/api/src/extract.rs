//! Request extractors shared by handlers.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use roster_core::error::CoreError;
use roster_core::types::DbId;

use crate::error::AppError;

/// The `{id}` path segment as an integer id.
///
/// A malformed segment is rejected with a 400 JSON error body instead of
/// axum's plain-text rejection.
///
/// ```ignore
/// async fn get_employee(RecordId(id): RecordId) -> AppResult<Json<()>> { .. }
/// ```
pub struct RecordId(pub DbId);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<DbId>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::Core(CoreError::Validation(format!(
                    "Invalid id: {}",
                    rejection.body_text()
                )))
            })?;
        Ok(Self(id))
    }
}
