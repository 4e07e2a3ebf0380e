//! HTTP control surface
//!
//! Thin axum layer over [`Soundboard`]: list, play and upload samples, play
//! a test tone, and feed bus messages in over HTTP.

pub mod handlers;

use crate::soundboard::Soundboard;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Multipart framing on top of the file itself
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub soundboard: Arc<Soundboard>,
    /// Largest accepted sample upload
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(soundboard: Arc<Soundboard>) -> Self {
        let max_upload_bytes = soundboard.config().webserver.max_upload_bytes;
        Self {
            soundboard,
            max_upload_bytes,
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes.saturating_add(UPLOAD_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api",
            Router::new()
                .route("/threads", get(handlers::threads))
                .route("/samples/list", get(handlers::list_samples))
                .route("/samples/play/:name", get(handlers::play_sample))
                .route(
                    "/samples/upload",
                    post(handlers::upload_sample).layer(DefaultBodyLimit::max(upload_limit)),
                )
                .route("/tones/play/square/:freq", get(handlers::play_square_tone))
                .route("/messages/*topic", post(handlers::post_message)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
