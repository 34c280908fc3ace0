use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Catalog load failed: {0}")]
    CatalogLoad(String),

    #[error("Index load failed: {0}")]
    IndexLoad(String),

    #[error("Index and identity map are inconsistent: {0}")]
    IndexMismatch(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Reranking failed: {0}")]
    Rerank(String),

    #[error("Fallback recommendation failed: {0}")]
    Fallback(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Service temporarily unavailable: {0}")]
    Resource(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Resource(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::CatalogLoad(e)
            | AppError::IndexLoad(e)
            | AppError::IndexMismatch(e)
            | AppError::Embedding(e) => {
                tracing::error!(error = %e, "Retrieval resource error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            // Recovered inside the pipeline; reaching the HTTP layer means a bug.
            AppError::Rerank(e) | AppError::Fallback(e) => {
                tracing::error!(error = %e, "External capability error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
