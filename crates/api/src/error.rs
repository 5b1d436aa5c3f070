use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roster_core::error::CoreError;
use roster_core::store::StoreError;
use roster_core::validation::Rejection;
use roster_core::writer::WriteError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and the store/writer errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `roster_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A store failure outside the writer.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record that failed validation.
    #[error("{0}")]
    Rejected(Rejection),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<WriteError> for AppError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Rejected(rejection) => AppError::Rejected(rejection),
            WriteError::NotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "Employee",
                id,
            }),
            WriteError::Constraint(msg) => AppError::Core(CoreError::Conflict(msg)),
            WriteError::IdCollision(_) | WriteError::Store(_) => {
                AppError::InternalError(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            },

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::DuplicateId(_) | StoreError::Constraint(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                StoreError::General(msg) => {
                    tracing::error!(error = %msg, "Store error");
                    internal()
                }
            },

            // --- Validation rejections carry the failing fields ---
            AppError::Rejected(rejection) => {
                let body = json!({
                    "error": rejection.message(),
                    "code": "VALIDATION_ERROR",
                    "reason": rejection.reason,
                    "fields": rejection.field_labels(),
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response();
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
