// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! driftbin service entry point.
//!
//! ## Configuration
//!
//! Defaults come from [`driftbin::Config`]; environment variables override:
//!
//! - `BIND_ADDR`: server bind address (default: 0.0.0.0:8080)
//! - `PUBLIC_BASE_URL`: base URL used in share links
//! - `SHARE_TTL_SECS`: retention window in seconds (default: 10800)
//! - `MAX_UPLOAD_BYTES`: upload size ceiling (default: 52428800)
//! - `REAPER_INTERVAL_SECS`: scheduled cleanup interval (default: 3600)
//! - `REAPER_ENABLED`: set to `false` to disable scheduled cleanup
//! - `BLOB_DIR`: directory for stored files (default: ./blobs)
//! - `BLOB_PUBLIC_BASE_URL`: absolute URL prefix for blob links; empty
//!   means the service streams file bytes itself

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use driftbin::config::Config;
use driftbin::handlers::{self, AppState};
use driftbin::metrics::Metrics;
use driftbin::quota::QuotaTracker;
use driftbin::reaper::Reaper;
use driftbin::store::ShareStore;
use driftbin::FsBlobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        ttl_secs = config.retention.ttl_secs,
        max_upload_bytes = config.retention.max_upload_bytes,
        reaper_interval_secs = config.retention.reaper_interval_secs,
        reaper_enabled = config.retention.reaper_enabled,
        blob_dir = %config.blob.dir,
        "Starting driftbin"
    );

    // Create application state
    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(ShareStore::new(
        config.retention.ttl(),
        config.retention.max_title_chars,
    ));
    let blobs = Arc::new(FsBlobStore::new(&config.blob.dir, &config.blob.public_base_url).await?);
    let reaper = Arc::new(Reaper::new(store.clone(), blobs.clone(), metrics.clone()));
    let quota = QuotaTracker::new();

    let state = Arc::new(AppState {
        quota,
        store,
        blobs,
        reaper: reaper.clone(),
        metrics,
        started_at: Instant::now(),
        config: config.clone(),
    });

    // Spawn the scheduled reaper
    if config.retention.reaper_enabled {
        reaper.spawn_scheduled(config.retention.reaper_interval());
    } else {
        info!("scheduled reaper disabled; cleanup only runs via POST /cleanup");
    }

    // Spawn quota state sweeping
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweep_state.quota.sweep().await;
        }
    });

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/upload", post(handlers::upload))
        .route("/all", get(handlers::list_all))
        .route("/cleanup", post(handlers::trigger_cleanup))
        .route("/cleanup/stats", get(handlers::cleanup_stats))
        .route("/rate-limit/stats", get(handlers::rate_limit_stats))
        .route("/file/:id", get(handlers::get_file))
        .route("/:id", get(handlers::get_share))
        .layer(DefaultBodyLimit::max(config.retention.max_upload_bytes + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from environment variables over the defaults.
fn load_config() -> Config {
    let mut config = Config::default();

    if let Ok(value) = std::env::var("BIND_ADDR") {
        config.bind_addr = value;
    }
    if let Ok(value) = std::env::var("PUBLIC_BASE_URL") {
        config.public_base_url = value;
    }
    if let Some(value) = env_parse("SHARE_TTL_SECS") {
        config.retention.ttl_secs = value;
    }
    if let Some(value) = env_parse("MAX_UPLOAD_BYTES") {
        config.retention.max_upload_bytes = value;
    }
    if let Some(value) = env_parse("REAPER_INTERVAL_SECS") {
        config.retention.reaper_interval_secs = value;
    }
    if let Some(value) = env_parse("REAPER_ENABLED") {
        config.retention.reaper_enabled = value;
    }
    if let Ok(value) = std::env::var("BLOB_DIR") {
        config.blob.dir = value;
    }
    if let Ok(value) = std::env::var("BLOB_PUBLIC_BASE_URL") {
        config.blob.public_base_url = value;
    }

    config
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
