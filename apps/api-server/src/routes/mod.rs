mod caption;
mod images;
mod stats;

use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

pub fn get_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    let thumbnail_dir = state.processor.thumbnail_dir().to_path_buf();

    Router::new()
        .route("/", get(|| async { "Hello World!" }))
        .route("/api/image/upload", post(caption::upload))
        .route("/api/images", post(images::create).get(images::list))
        .route("/api/images/:id", get(images::read))
        .route("/api/images/:id/thumbnails/:size", get(images::thumbnail_page))
        .route("/api/stats", get(stats::read))
        .nest_service("/thumbnails", ServeDir::new(thumbnail_dir))
        // uploads are passed straight to the image decoder, no size cap
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}
