//! Router assembly (spec §6).

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::health::{health, ready};
use crate::handlers::transcribe::{
    cancel_task, create_batch_audio, create_batch_video, create_task, delete_task, download_task, extract_audio,
    get_task, list_tasks,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let transcribe_routes = Router::new()
        .route("/transcribe/", post(create_task).get(list_tasks))
        .route("/transcribe/batch-audio", post(create_batch_audio))
        .route("/transcribe/extract-audio", post(extract_audio))
        .route("/transcribe/batch-video", post(create_batch_video))
        .route("/transcribe/:task_id", get(get_task).delete(delete_task))
        .route("/transcribe/:task_id/download", get(download_task))
        .route("/transcribe/:task_id/cancel", post(cancel_task));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .merge(transcribe_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
