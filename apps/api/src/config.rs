use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; a malformed value fails startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory holding the `<locale>.json` CV datasets.
    pub data_dir: PathBuf,
    pub default_locale: String,
    pub max_sessions: usize,
    /// Capture scale for raster PDF export.
    pub raster_scale: f32,
    /// How long a raster export waits for the preview to publish the frame it captures.
    pub render_settle_timeout: Duration,
    /// A session not touched for this long is unmounted.
    pub idle_session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            data_dir: PathBuf::from(env_or("CV_DATA_DIR", "data/cv")),
            default_locale: env_or("DEFAULT_LOCALE", "en"),
            max_sessions: env_or("MAX_SESSIONS", "256")
                .parse::<usize>()
                .context("MAX_SESSIONS must be a positive integer")?,
            raster_scale: parse_scale(&env_or("RASTER_SCALE", "2.0"))?,
            render_settle_timeout: Duration::from_millis(
                env_or("RENDER_SETTLE_TIMEOUT_MS", "2000")
                    .parse::<u64>()
                    .context("RENDER_SETTLE_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            idle_session_ttl: parse_ttl(&env_or("IDLE_SESSION_TTL_SECS", "1800"))?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            data_dir: PathBuf::from("data/cv"),
            default_locale: "en".to_string(),
            max_sessions: 256,
            raster_scale: 2.0,
            render_settle_timeout: Duration::from_millis(2000),
            idle_session_ttl: Duration::from_secs(1800),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_scale(raw: &str) -> Result<f32> {
    let scale = raw
        .parse::<f32>()
        .with_context(|| format!("RASTER_SCALE '{raw}' is not a number"))?;
    anyhow::ensure!(
        scale.is_finite() && scale > 0.0,
        "RASTER_SCALE must be greater than zero, got {scale}"
    );
    Ok(scale)
}

fn parse_ttl(raw: &str) -> Result<Duration> {
    let secs = raw
        .parse::<u64>()
        .with_context(|| format!("IDLE_SESSION_TTL_SECS '{raw}' is not a number of seconds"))?;
    anyhow::ensure!(secs > 0, "IDLE_SESSION_TTL_SECS must be greater than zero");
    Ok(Duration::from_secs(secs))
}
