//! Integration tests for the HTTP control surface
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`;
//! the soundboard behind it plays into an in-memory sink.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use soundboard::api::{create_router, AppState};
use soundboard::audio::{AudioBuffer, AudioSink};
use soundboard::ducking::DisabledPlayer;
use soundboard::{Result, Soundboard};
use soundboard_common::SoundboardConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<usize>>,
}

impl AudioSink for RecordingSink {
    fn write(&mut self, _buffer: &AudioBuffer) -> Result<()> {
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

struct TestServer {
    _dir: TempDir,
    router: axum::Router,
    soundboard: Arc<Soundboard>,
    sink: RecordingSink,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.soundboard.shutdown();
    }
}

fn setup_test_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let samples = dir.path().join("samples");
    std::fs::create_dir(&samples).unwrap();
    std::fs::write(samples.join("airhorn.wav"), b"not really audio").unwrap();

    let mut config = SoundboardConfig::default();
    config.sample_path = samples;
    config.speech.cache = dir.path().join("cache");
    config.mpd.enabled = false;
    config.webserver.max_upload_bytes = 1024;

    let sink = RecordingSink::default();
    let soundboard = Arc::new(
        Soundboard::new(config, Box::new(sink.clone()), Arc::new(DisabledPlayer), HashMap::new()).unwrap(),
    );
    let router = create_router(AppState::new(Arc::clone(&soundboard)));

    TestServer {
        _dir: dir,
        router,
        soundboard,
        sink,
    }
}

/// Helper function to make HTTP requests to the test server
async fn make_request(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &axum::Router, path: &str) -> (StatusCode, Value) {
    make_request(app, Request::builder().uri(path).body(Body::empty()).unwrap()).await
}

async fn post(app: &axum::Router, path: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .body(Body::from(body))
        .unwrap();
    make_request(app, request).await
}

fn multipart_upload(file_name: &str, data: &[u8]) -> Request<Body> {
    let boundary = "soundboard-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/samples/upload")
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = setup_test_server();
    let (status, body) = get(&server.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "soundboard");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_threads() {
    let server = setup_test_server();
    let (status, body) = get(&server.router, "/api/threads").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "OK");
    let threads: Vec<&str> = body["threads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(threads, vec!["sample-player", "tone-player"]);
    assert_eq!(body["queued"]["samples"], 0);
    assert_eq!(body["queued"]["tones"], 0);
}

#[tokio::test]
async fn test_list_samples() {
    let server = setup_test_server();
    let (status, body) = get(&server.router, "/api/samples/list").await;

    assert_eq!(status, StatusCode::OK);
    let samples = body["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["name"], "airhorn");
    assert_eq!(samples[0]["ext"], ".wav");
}

#[tokio::test]
async fn test_play_sample_miss_and_hit() {
    let server = setup_test_server();

    let (status, body) = get(&server.router, "/api/samples/play/kazoo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["response"], "FAIL");
    assert_eq!(body["MSG"], "Couldn't find kazoo");

    let (status, body) = get(&server.router, "/api/samples/play/horn").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "OK");
    assert!(body.get("MSG").is_none());
}

#[tokio::test]
async fn test_square_tone_reaches_sink() {
    let server = setup_test_server();

    let (status, body) = get(&server.router, "/api/tones/play/square/440").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "OK");

    let deadline = Instant::now() + Duration::from_secs(5);
    while *server.sink.writes.lock().unwrap() == 0 {
        assert!(Instant::now() < deadline, "tone never reached the sink");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = get(&server.router, "/api/tones/play/square/loud").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response"], "FAIL");
}

#[tokio::test]
async fn test_messages_are_routed_through_ingress() {
    let server = setup_test_server();

    let (status, _) = post(&server.router, "/api/messages/soundboard/play", "AIRHORN 440hzsq0.1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&server.router, "/api/messages/soundboard/play", "kazoo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["response"], "FAIL");

    let (status, _) = post(&server.router, "/api/messages/lights/on", "1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&server.router, "/api/messages/soundboard/tone", r#"{"type":"dtmf","digits":"12"}"#).await;
    assert_eq!(status, StatusCode::OK);

    // No doorbell directory configured
    let (status, _) = post(&server.router, "/api/messages/soundboard/doorbell", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_upload() {
    let server = setup_test_server();

    let (status, body) = make_request(&server.router, multipart_upload("ding.ogg", b"OggS")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "ding.ogg");
    assert!(server.soundboard.samples().dir().join("ding.ogg").is_file());

    let (status, body) = make_request(&server.router, multipart_upload("ding.ogg", b"OggS")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "collision: {}", body);

    let (status, _) = make_request(&server.router, multipart_upload("virus.exe", b"MZ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(&server.router, multipart_upload("big.wav", &[0u8; 2048])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
