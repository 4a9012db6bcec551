use crate::{error::ApiError, AppState};
use ai::ImageCaptionInput;
use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct CaptionResponse {
    pub caption: String,
}

/// `POST /api/image/upload` — raw image bytes in, one generated caption out.
///
/// The body is interpreted unconditionally as an encoded image; an
/// undecodable body is the caller's fault (400), a generation failure is
/// ours (500).
pub async fn upload(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CaptionResponse>, ApiError> {
    let image = image::load_from_memory(&body)?;

    let caption = state
        .caption_model
        .process(ImageCaptionInput { image })
        .await
        .map_err(ApiError::Inference)?;

    Ok(Json(CaptionResponse { caption }))
}
