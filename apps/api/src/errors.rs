use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cv::path::PathError;
use crate::cv::schema::CustomizationError;
use crate::export::ExportError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A store operation rejected its path or value. Never swallowed: the edit did not apply.
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Customization error: {0}")]
    Customization(#[from] CustomizationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Path(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.code(), e.to_string()),
            AppError::Customization(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_CUSTOMIZATION",
                e.to_string(),
            ),
            AppError::Export(e @ ExportError::MissingCapture(_))
            | AppError::Export(e @ ExportError::Decode(_))
            | AppError::Export(e @ ExportError::InvalidBitmap(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_CAPTURE", e.to_string())
            }
            AppError::Export(ExportError::RenderTimeout) => {
                tracing::error!("Preview did not settle before export");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "RENDER_TIMEOUT",
                    "The preview did not finish rendering in time".to_string(),
                )
            }
            AppError::Export(e) => {
                tracing::error!("Export error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXPORT_ERROR",
                    "The export could not be produced".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
