//! API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use txo_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("txo=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("starting txo-api");

    let config = ApiConfig::from_env();
    info!(host = %config.host, port = config.port, "loaded configuration");

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(err) => {
            error!(%err, "failed to build application state");
            std::process::exit(1);
        }
    };

    if let Err(err) = state.scheduler.recover().await {
        error!(%err, "startup recovery failed");
        std::process::exit(1);
    }

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    let scheduler = state.scheduler.clone();
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("invalid bind address");

    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler.clone()))
        .await
        .expect("server error");

    info!("waiting for in-flight tasks to drain");
    scheduler.wait_for_jobs().await;

    info!("server shutdown complete");
}

async fn shutdown_signal(scheduler: Arc<txo_scheduler::Scheduler<txo_api::state::AnyTranscriber>>) {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    info!("received shutdown signal");
    scheduler.shutdown();
}
