mod builder;
mod config;
mod cv;
mod errors;
mod export;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::cv::dataset::DatasetCatalog;
use crate::routes::build_router;
use crate::state::AppState;

/// Upper bound on how often idle sessions are swept.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Load locale datasets
    let datasets = DatasetCatalog::load_dir(&config.data_dir)
        .await
        .with_context(|| format!("Failed to load CV datasets from {}", config.data_dir.display()))?;
    if datasets.get(&config.default_locale).is_none() {
        warn!(
            "No dataset for default locale '{}'; sessions must supply a locale or a document",
            config.default_locale
        );
    }
    info!("CV datasets loaded: {:?}", datasets.locales());
    info!(
        "Sessions: max {}, idle TTL {:?}, raster scale {}x, settle timeout {:?}",
        config.max_sessions, config.idle_session_ttl, config.raster_scale, config.render_settle_timeout
    );

    // Build app state
    let state = AppState::new(config.clone(), datasets);
    state
        .sessions
        .spawn_sweeper(config.idle_session_ttl.min(SWEEP_PERIOD));

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the front-end host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
