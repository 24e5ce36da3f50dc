//! End-to-end HTTP tests driving the full router through `tower::ServiceExt`,
//! covering the upload -> admit -> complete -> download lifecycle and the
//! request-validation error paths (spec §7, §8).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use txo_api::state::AnyTranscriber;
use txo_api::{create_router, ApiConfig, AppState};
use txo_ingest::Ingestor;
use txo_media::MediaExtractor;
use txo_scheduler::{Scheduler, SchedulerConfig};
use txo_store::TaskStore;
use txo_transcriber::NoopTranscriber;

/// Builds an `AppState` without touching a real `ffmpeg` binary, mirroring
/// the test-construction pattern used inside `txo-ingest`'s own tests.
async fn test_state(base: &std::path::Path, max_audio_bytes: u64) -> AppState {
    let audios_dir = base.join("audios");
    let transcriptions_dir = base.join("transcriptions");
    let videos_tmp_dir = base.join("videos_tmp");
    tokio::fs::create_dir_all(&audios_dir).await.unwrap();
    tokio::fs::create_dir_all(&transcriptions_dir).await.unwrap();
    tokio::fs::create_dir_all(&videos_tmp_dir).await.unwrap();

    let config = ApiConfig {
        audios_dir: audios_dir.clone(),
        transcriptions_dir: transcriptions_dir.clone(),
        videos_tmp_dir: videos_tmp_dir.clone(),
        max_audio_bytes,
        queue_depth: 8,
        max_concurrent_tasks: 2,
        ..ApiConfig::default()
    };

    let store = Arc::new(TaskStore::load(transcriptions_dir.join("tasks.json")).await);
    let transcriber = Arc::new(AnyTranscriber::Noop(NoopTranscriber::new()));
    let extractor = Arc::new(MediaExtractor::with_ffmpeg_path(
        PathBuf::from("/usr/bin/ffmpeg"),
        config.extractor_timeout(),
    ));

    let scheduler_config = SchedulerConfig {
        max_concurrent_tasks: config.max_concurrent_tasks,
        queue_depth: config.queue_depth,
        task_timeout: config.task_timeout(),
    };
    let scheduler = Scheduler::new(
        scheduler_config,
        Arc::clone(&store),
        Arc::clone(&transcriber),
        transcriptions_dir.clone(),
    );
    let ingestor = Arc::new(
        Ingestor::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            Arc::clone(&extractor),
            audios_dir,
            videos_tmp_dir,
        )
        .with_limits(config.max_audio_bytes, config.max_video_bytes),
    );

    AppState {
        config: Arc::new(config),
        store,
        scheduler,
        ingestor,
        extractor,
    }
}

fn multipart_body(boundary: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024).await;
    let app = create_router(state, None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn single_audio_upload_completes_and_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024).await;
    let app = create_router(state, None);

    let boundary = "X-BOUNDARY-1";
    let body = multipart_body(boundary, "clip.wav", "audio/wav", b"not-really-a-wav-but-bytes");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcribe/")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    assert_eq!(created["status"], "pending");
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let mut status = String::new();
    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/transcribe/{task_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record = response_json(response).await;
        status = record["status"].as_str().unwrap().to_string();
        if status == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/transcribe/{task_id}/download"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!bytes.is_empty());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/transcribe/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let listed = response_json(response).await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn oversize_audio_upload_is_rejected_without_creating_a_task() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 8).await;
    let app = create_router(state, None);

    let boundary = "X-BOUNDARY-2";
    let body = multipart_body(boundary, "clip.wav", "audio/wav", &[0u8; 4096]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcribe/")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = app
        .oneshot(Request::builder().uri("/transcribe/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let listed = response_json(response).await;
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn unsupported_extension_is_rejected_with_415() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024).await;
    let app = create_router(state, None);

    let boundary = "X-BOUNDARY-3";
    let body = multipart_body(boundary, "clip.exe", "application/octet-stream", b"MZ\0\0");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcribe/")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn unknown_task_id_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024).await;
    let app = create_router(state, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/transcribe/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn cancel_then_delete_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024).await;
    let app = create_router(state, None);

    let boundary = "X-BOUNDARY-4";
    let body = multipart_body(boundary, "clip.wav", "audio/wav", b"some-bytes");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcribe/")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = response_json(response).await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/transcribe/{task_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mut status = String::new();
    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/transcribe/{task_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let record = response_json(response).await;
        status = record["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(status == "completed" || status == "failed");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/transcribe/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/transcribe/{task_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
