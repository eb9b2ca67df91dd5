use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cabin_catalog::CatalogError;
use cabin_core::{ErrorClass, ReservationError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err.class() {
            ErrorClass::NotFound => AppError::NotFound(err.to_string()),
            ErrorClass::Conflict => AppError::Conflict(err.to_string()),
            ErrorClass::Invalid => AppError::Validation(err.to_string()),
            ErrorClass::Transient => AppError::Unavailable(err.to_string()),
            ErrorClass::Internal => AppError::Internal(err.into()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Rejected(inner) => inner.into(),
            CatalogError::Parse(e) => AppError::Validation(format!("Malformed seat map: {e}")),
            CatalogError::Io(e) => AppError::Internal(anyhow::Error::new(e).context("reading seat map")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable, retry later".to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
