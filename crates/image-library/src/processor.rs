use crate::{ProcessedImageUpdate, STATUS_FAILED, STATUS_SUCCESS};
use anyhow::anyhow;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

const SMALL_THUMBNAIL_WIDTH: u32 = 128;
const MEDIUM_THUMBNAIL_WIDTH: u32 = 256;

/// Decodes uploads, extracts their metadata and writes the small/medium WebP
/// thumbnails next to each other in one directory.
pub struct ImageProcessor {
    thumbnail_dir: PathBuf,
}

impl ImageProcessor {
    pub fn new(thumbnail_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let thumbnail_dir = thumbnail_dir.into();
        std::fs::create_dir_all(&thumbnail_dir)?;
        Ok(Self { thumbnail_dir })
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnail_dir
    }

    /// Always returns a completed update row: a rejected or undecodable file
    /// comes back as a `failed` record with its error message, never as an
    /// error.
    pub fn process_image(&self, image_id: &str, bytes: &[u8]) -> ProcessedImageUpdate {
        let start = Instant::now();

        match self.try_process(image_id, bytes) {
            Ok(mut update) => {
                update.image_id = image_id.to_string();
                update.status = STATUS_SUCCESS.to_string();
                update.processing_time = Some(start.elapsed().as_secs_f64() * 1000.0);
                update.size_bytes = Some(bytes.len() as i64);
                update
            }
            Err(e) => {
                warn!("processing image {} failed: {}", image_id, e);
                ProcessedImageUpdate {
                    image_id: image_id.to_string(),
                    status: STATUS_FAILED.to_string(),
                    error_msg: Some("invalid file format".to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn try_process(&self, image_id: &str, bytes: &[u8]) -> anyhow::Result<ProcessedImageUpdate> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| anyhow!("unrecognized image format"))?;

        // only PNG and JPEG uploads are accepted into the library
        let format_name = match format {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            other => anyhow::bail!("unsupported image format: {:?}", other),
        };

        let image = reader.decode()?;
        debug!("image size: {:?} * {:?}", image.width(), image.height());

        for (suffix, target_width) in [
            ("small", SMALL_THUMBNAIL_WIDTH),
            ("medium", MEDIUM_THUMBNAIL_WIDTH),
        ] {
            let ratio = target_width as f64 / image.width() as f64;
            let new_height = (image.height() as f64 * ratio) as u32;
            let thumbnail = image.thumbnail(target_width, new_height.max(1));

            let thumbnail_path = self
                .thumbnail_dir
                .join(format!("{}_{}.webp", image_id, suffix));
            thumbnail.save_with_format(&thumbnail_path, ImageFormat::WebP)?;
        }

        Ok(ProcessedImageUpdate {
            width: Some(image.width()),
            height: Some(image.height()),
            format: Some(format_name.to_string()),
            thumbnail: Some(image_id.to_string()),
            ..Default::default()
        })
    }
}
