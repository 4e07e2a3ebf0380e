//! HTTP request handlers
//!
//! Every `/api` endpoint answers `{"response":"OK", ...}` on success and
//! `{"response":"FAIL","MSG":...}` with a matching status code otherwise.

use crate::api::AppState;
use crate::error::Error;
use crate::samples::SampleInfo;
use crate::tones::{ToneJob, Waveform};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    response: &'static str,
    #[serde(rename = "MSG", skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            response: "OK",
            msg: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    response: &'static str,
    threads: Vec<String>,
    queued: QueueDepth,
}

#[derive(Debug, Serialize)]
pub struct QueueDepth {
    samples: usize,
    tones: usize,
}

#[derive(Debug, Serialize)]
pub struct SamplesResponse {
    response: &'static str,
    samples: Vec<SampleInfo>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    response: &'static str,
    name: String,
}

type Failure = (StatusCode, Json<StatusResponse>);

fn fail(status: StatusCode, msg: impl Into<String>) -> Failure {
    (
        status,
        Json(StatusResponse {
            response: "FAIL",
            msg: Some(msg.into()),
        }),
    )
}

/// Run directory scans and file writes off the async workers
async fn blocking<T, F>(work: F) -> Result<T, Failure>
where
    F: FnOnce() -> Result<T, Failure> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Worker task failed: {}", e),
        )
    })?
}

fn fail_from(e: Error) -> Failure {
    let status = match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    fail(status, e.to_string())
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "soundboard".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/threads - worker thread names and queue depths
pub async fn threads(State(ctx): State<AppState>) -> Json<ThreadsResponse> {
    let (samples, tones) = ctx.soundboard.queued();
    Json(ThreadsResponse {
        response: "OK",
        threads: ctx.soundboard.threads().to_vec(),
        queued: QueueDepth { samples, tones },
    })
}

// ============================================================================
// Sample Endpoints
// ============================================================================

/// GET /api/samples/list
pub async fn list_samples(State(ctx): State<AppState>) -> Result<Json<SamplesResponse>, Failure> {
    let library = ctx.soundboard.samples().clone();
    let samples = blocking(move || library.list().map_err(fail_from)).await?;
    Ok(Json(SamplesResponse {
        response: "OK",
        samples,
    }))
}

/// GET /api/samples/play/:name - play the first sample whose stem contains `name`
pub async fn play_sample(
    State(ctx): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, Failure> {
    let library = ctx.soundboard.samples().clone();
    let query = name.clone();
    let sample = blocking(move || {
        library
            .find_by_stem(&query)
            .ok_or_else(|| fail(StatusCode::NOT_FOUND, format!("Couldn't find {}", query)))
    })
    .await?;

    info!("HTTP play request for {} -> {}", name, sample.path.display());
    ctx.soundboard.play_file(sample.path);
    Ok(StatusResponse::ok())
}

/// POST /api/samples/upload - multipart field `file`
pub async fn upload_sample(
    State(ctx): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Failure> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| fail(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| fail(StatusCode::BAD_REQUEST, "Upload has no file name"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| fail(StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?;

        let library = ctx.soundboard.samples().clone();
        let max_bytes = ctx.max_upload_bytes;
        let upload_name = file_name.clone();
        let path = blocking(move || {
            library.save_upload(&upload_name, &data, max_bytes).map_err(|e| {
                warn!("Rejected upload {}: {}", upload_name, e);
                fail_from(e)
            })
        })
        .await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);
        return Ok(Json(UploadResponse { response: "OK", name }));
    }

    Err(fail(StatusCode::BAD_REQUEST, "Missing multipart field 'file'"))
}

// ============================================================================
// Tone and Message Endpoints
// ============================================================================

/// GET /api/tones/play/square/:freq - one second square wave
pub async fn play_square_tone(
    State(ctx): State<AppState>,
    Path(freq): Path<String>,
) -> Result<Json<StatusResponse>, Failure> {
    let freq = freq
        .parse::<f32>()
        .ok()
        .filter(|f| f.is_finite() && *f > 0.0)
        .ok_or_else(|| fail(StatusCode::BAD_REQUEST, format!("Invalid frequency '{}'", freq)))?;

    ctx.soundboard.play_tone(ToneJob::tone(Waveform::Square, freq, 1.0));
    Ok(StatusResponse::ok())
}

/// POST /api/messages/*topic - the body is the raw message payload
pub async fn post_message(
    State(ctx): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Json<StatusResponse>, Failure> {
    let topic = topic.trim_start_matches('/').to_string();
    // Theme song and doorbell triggers scan their directories
    blocking(move || {
        ctx.soundboard.dispatch(&topic, &body).map_err(|e| {
            warn!("Message on {} rejected: {}", topic, e);
            fail_from(e)
        })
    })
    .await?;
    Ok(StatusResponse::ok())
}
