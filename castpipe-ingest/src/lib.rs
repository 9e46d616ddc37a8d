//! castpipe-ingest library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod error;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use castpipe_common::IngestConfig;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::services::{IngestionOrchestrator, ShowNameSource};
use crate::store::ObjectStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<IngestConfig>,
    /// Batch ingestion pipeline
    pub orchestrator: Arc<IngestionOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn ObjectStore>,
        show_names: Arc<dyn ShowNameSource>,
    ) -> Self {
        let orchestrator = IngestionOrchestrator::new(store, show_names, &config);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
