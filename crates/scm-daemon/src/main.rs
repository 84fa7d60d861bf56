//! scm-daemon entry point.
//!
//! Thin: sets up tracing, loads config, builds the shared state, wires
//! middleware, boots the session and starts the HTTP server. Handlers live
//! in `routes.rs`; loading and refresh in `refresh.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use scm_config::{load_dashboard_config, report_unused_keys, ConfigConsumer, UnusedKeyPolicy};
use scm_daemon::{
    kv::{JsonFileKvStore, KvStore, MemoryKvStore},
    refresh, routes, state,
};
use scm_sheets::HttpSheetSource;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let (loaded, cfg) = load_dashboard_config(&path_refs).context("config load failed")?;
    let report = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        warn!(keys = ?report.unused_leaf_pointers, "unused config keys");
    }
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let kv: Arc<dyn KvStore> = match &cfg.daemon.state_file {
        Some(path) => Arc::new(JsonFileKvStore::open(path)?),
        None => Arc::new(MemoryKvStore::new()),
    };

    let fallback_addr = cfg.daemon.addr.parse::<SocketAddr>().ok();
    let refresh_cfg = cfg.refresh.clone();

    let shared = Arc::new(state::AppState::new(
        cfg,
        loaded.config_hash,
        Arc::new(HttpSheetSource::new()),
        kv,
    )?);

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    {
        let st = Arc::clone(&shared);
        tokio::spawn(async move {
            refresh::boot(&st).await;
            if refresh_cfg.enabled {
                refresh::spawn_auto_refresh(st, Duration::from_secs(refresh_cfg.interval_secs));
            }
        });
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or(fallback_addr)
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("scm-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `SCM_CONFIG`: comma-separated YAML layers, later wins.
fn config_paths_from_env() -> Vec<String> {
    std::env::var("SCM_CONFIG")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SCM_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
