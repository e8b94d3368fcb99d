//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use unibot_chat::ChatOrchestrator;
use unibot_core::config::UnibotConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only once the server starts).
    pub config: Arc<UnibotConfig>,
    /// Session registry and chat engine.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: UnibotConfig, orchestrator: Arc<ChatOrchestrator>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            start_time: Instant::now(),
        }
    }
}
