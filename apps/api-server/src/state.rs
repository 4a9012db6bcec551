use ai::ImageCaptionModel;
use image_library::{ImageLibrary, ImageProcessor};
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-process services, constructed once at bootstrap and injected into
/// every handler. The caption model handle is already serialized internally;
/// the sqlite connection is guarded here.
#[derive(Clone)]
pub struct AppState {
    pub caption_model: ImageCaptionModel,
    pub library: Arc<Mutex<ImageLibrary>>,
    pub processor: Arc<ImageProcessor>,
    /// Origin used when building absolute thumbnail URLs in responses.
    pub public_origin: String,
}
