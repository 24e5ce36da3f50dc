//! Axum HTTP surface for the transcription job orchestrator: upload
//! endpoints, task inspection, and the health/metrics probes that sit in
//! front of `txo-scheduler` and `txo-ingest`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
