//! `GET /health` and `GET /ready` (spec §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe: the process is up and serving requests.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string() })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub store: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self { status: "ok".to_string(), error: None }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }
}

/// Readiness probe: `ffmpeg` is resolvable and the task store's backing file
/// is writable. Used by orchestrators to gate traffic until both hold.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let ffmpeg_check = if state.extractor.ffmpeg_path().is_file() {
        CheckStatus::ok()
    } else {
        CheckStatus::error(format!(
            "ffmpeg binary not found at {}",
            state.extractor.ffmpeg_path().display()
        ))
    };

    let store_check = match store_is_writable(&state).await {
        Ok(()) => CheckStatus::ok(),
        Err(err) => CheckStatus::error(err),
    };

    let all_ok = ffmpeg_check.status == "ok" && store_check.status == "ok";

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            ffmpeg: ffmpeg_check,
            store: store_check,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn store_is_writable(state: &AppState) -> Result<(), String> {
    let probe_path = state.store.path().with_extension("ready-probe");
    match tokio::fs::write(&probe_path, b"").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe_path).await;
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}
