use crate::{error::ApiError, AppState};
use ai::ImageCaptionInput;
use axum::body::Bytes;
use axum::extract::{Multipart, Path as PathParams, State};
use axum::response::{Html, Redirect};
use axum::Json;
use image_library::{ImageData, STATUS_SUCCESS};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
pub struct ImageResponse {
    pub status: String,
    pub data: ImageResponseData,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ImageResponseData {
    pub image_id: String,
    pub original_name: String,
    pub processed_at: Option<String>,
    pub processing_time: Option<f64>,
    pub metadata: ImageMetadataResponse,
    pub thumbnails: ThumbnailLinks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Serialize, Default)]
pub struct ImageMetadataResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

#[derive(Serialize, Default)]
pub struct ThumbnailLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
}

/// Mirror of the record row in response-envelope form. Failed records expose
/// only their error, not metadata or thumbnail links.
fn to_image_response(origin: &str, data: ImageData) -> ImageResponse {
    let mut response = ImageResponse {
        status: data.status,
        data: ImageResponseData {
            image_id: data.image_id,
            original_name: data.original_name,
            processed_at: data.processed_at,
            processing_time: None,
            metadata: ImageMetadataResponse::default(),
            thumbnails: ThumbnailLinks::default(),
            caption: None,
        },
        error: data.error_msg,
    };

    if response.error.is_none() {
        response.data.processing_time = data.processing_time;
        response.data.metadata = ImageMetadataResponse {
            width: data.width,
            height: data.height,
            format: data.format,
            size_bytes: data.size_bytes,
        };
        if let Some(thumbnail) = data.thumbnail {
            response.data.thumbnails = ThumbnailLinks {
                small: Some(format!(
                    "{}/api/images/{}/thumbnails/small",
                    origin, thumbnail
                )),
                medium: Some(format!(
                    "{}/api/images/{}/thumbnails/medium",
                    origin, thumbnail
                )),
            };
        }
        response.data.caption = data.caption;
    }

    response
}

/// `POST /api/images` — multipart upload into the library. The record is
/// pre-inserted and the response redirects to it immediately; metadata,
/// thumbnails and the caption are filled in by a background task.
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("image") {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            upload = Some((original_name, bytes));
            break;
        }
    }

    let (original_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing \"image\" field".to_string()))?;

    let image_id = state.library.lock().insert_image_row(&original_name)?;

    {
        let state = state.clone();
        let image_id = image_id.clone();
        tokio::spawn(async move {
            process_upload(state, image_id, bytes).await;
        });
    }

    Ok(Redirect::to(&format!("/api/images/{}", image_id)))
}

/// Completes an uploaded record: decode + thumbnails + metadata first, then
/// caption generation. Captioning mirrors the original fire-and-forget call:
/// a failure there is logged and the record simply stays caption-less.
async fn process_upload(state: AppState, image_id: String, bytes: Bytes) {
    let update = {
        let processor = state.processor.clone();
        let image_id = image_id.clone();
        let bytes = bytes.clone();
        match tokio::task::spawn_blocking(move || processor.process_image(&image_id, &bytes)).await
        {
            Ok(update) => update,
            Err(e) => {
                error!("image processing task panicked: {}", e);
                return;
            }
        }
    };

    let succeeded = update.status == STATUS_SUCCESS;
    if let Err(e) = state.library.lock().update_image_data(&update) {
        error!("failed to persist record for {}: {}", image_id, e);
        return;
    }
    if !succeeded {
        return;
    }

    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!("image {} not decodable for captioning: {}", image_id, e);
            return;
        }
    };
    match state.caption_model.process(ImageCaptionInput { image }).await {
        Ok(caption) => {
            if let Err(e) = state.library.lock().set_image_caption(&caption, &image_id) {
                error!("failed to store caption for {}: {}", image_id, e);
            }
        }
        Err(e) => {
            error!("caption generation for {} failed: {}", image_id, e);
        }
    }
}

/// `GET /api/images` — every record in the library.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let records = state.library.lock().get_image_data_array()?;
    let response = records
        .into_iter()
        .map(|data| to_image_response(&state.public_origin, data))
        .collect();

    Ok(Json(response))
}

/// `GET /api/images/:id`
pub async fn read(
    State(state): State<AppState>,
    PathParams(image_id): PathParams<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let data = state.library.lock().get_image_data(&image_id)?.ok_or_else(|| {
        ApiError::NotFound(format!("Image Data with ID \"{}\" not found.", image_id))
    })?;

    Ok(Json(to_image_response(&state.public_origin, data)))
}

/// `GET /api/images/:id/thumbnails/:size` — a minimal HTML page embedding
/// the stored thumbnail and the caption.
pub async fn thumbnail_page(
    State(state): State<AppState>,
    PathParams((image_id, size)): PathParams<(String, String)>,
) -> Result<Html<String>, ApiError> {
    let data = state.library.lock().get_image_data(&image_id)?.ok_or_else(|| {
        ApiError::NotFound(format!("Thumbnail with ID \"{}\" not found.", image_id))
    })?;

    let src = format!(
        "{}/thumbnails/{}_{}.webp",
        state.public_origin, image_id, size
    );
    let caption = data.caption.unwrap_or_default();

    Ok(Html(format!(
        "<img src=\"{}\" style=\"display:block\"/><p>{}</p>",
        src, caption
    )))
}
