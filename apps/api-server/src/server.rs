use crate::routes::get_router;
use crate::state::AppState;
use ai::{blip::BLIP, ImageCaptionModel};
use anyhow::Context;
use file_downloader::{FileDownload, FileDownloadConfig};
use image_library::{ImageLibrary, ImageProcessor};
use parking_lot::Mutex;
use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;

const MODEL_REPOSITORY_URL: &str = "https://huggingface.co";

/// The one pretrained artifact this service captions with. There is no
/// configuration to swap it out.
const BLIP_MODEL_ID: &str = "blip-image-captioning-large";
const BLIP_TOKENIZER_URI: &str =
    "Salesforce/blip-image-captioning-large/resolve/main/tokenizer.json";
// quantized export of the same artifact, published as GGUF
const BLIP_WEIGHTS_URI: &str = "lmz/candle-blip/resolve/main/blip-image-captioning-large-q4k.gguf";

pub async fn start_server() -> anyhow::Result<()> {
    // reads .env internally, so RUST_LOG set there is picked up
    if let Ok(log_dir) = env::var("LOG_DIR") {
        analytics_tracing::init_tracing_to_file(PathBuf::from(log_dir));
    } else {
        analytics_tracing::init_tracing_to_stdout();
    }

    let local_data_dir = env::var("LOCAL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let downloader = FileDownload::new(FileDownloadConfig {
        url: MODEL_REPOSITORY_URL.to_string(),
        resources_dir: local_data_dir.join("resources"),
    });
    let weights_path = downloader
        .download_if_not_exists(BLIP_WEIGHTS_URI)
        .await
        .context("failed to fetch captioning model weights")?;
    let tokenizer_path = downloader
        .download_if_not_exists(BLIP_TOKENIZER_URI)
        .await
        .context("failed to fetch captioning tokenizer")?;

    // The model must be resident before the listener binds; any error here
    // is fatal to the process.
    info!("loading {}", BLIP_MODEL_ID);
    let blip = BLIP::new(&weights_path, &tokenizer_path).await?;
    let caption_model = ImageCaptionModel::serve(BLIP_MODEL_ID.to_string(), blip)?;

    let library = ImageLibrary::open(local_data_dir.join("database").join("database.db"))?;
    let processor = ImageProcessor::new(local_data_dir.join("thumbnails"))?;

    let state = AppState {
        caption_model,
        library: Arc::new(Mutex::new(library)),
        processor: Arc::new(processor),
        public_origin: format!("http://localhost:{}", port),
    };

    let app = get_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
