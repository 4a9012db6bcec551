use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Request failures, discriminated so an undecodable upload and an internal
/// model fault map to different status codes instead of one blanket catch.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not a decodable image: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error("{0}")]
    BadRequest(String),
    #[error("caption generation failed")]
    Inference(#[source] anyhow::Error),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidImage(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            ApiError::NotFound(_) | ApiError::BadRequest(_) | ApiError::InvalidImage(_) => {
                tracing::debug!("request rejected: {}", self)
            }
            _ => tracing::error!("request failed: {:?}", self),
        }

        (status, self.to_string()).into_response()
    }
}
