use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::ResumeModel;
use crate::tailoring::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Upstream model steps. `ClaudeResumeModel` in production.
    pub model: Arc<dyn ResumeModel>,
    pub sessions: SessionStore,
}
