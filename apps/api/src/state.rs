use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::TailorPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Tailoring pipeline. Holds the generation client as `Arc<dyn TextGenerator>`
    /// so tests can swap in a stub.
    pub pipeline: Arc<TailorPipeline>,
    pub config: Config,
}
