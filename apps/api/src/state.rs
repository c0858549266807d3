use std::sync::Arc;

use crate::builder::SessionRegistry;
use crate::config::Config;
use crate::cv::dataset::DatasetCatalog;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Mounted builders. Each session is independent and serialised by its own lock.
    pub sessions: SessionRegistry,
    /// Per-locale source documents, loaded once at startup.
    pub datasets: Arc<DatasetCatalog>,
}

impl AppState {
    pub fn new(config: Config, datasets: DatasetCatalog) -> Self {
        Self {
            sessions: SessionRegistry::new(config.max_sessions, config.idle_session_ttl),
            datasets: Arc::new(datasets),
            config,
        }
    }
}
