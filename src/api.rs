//! HTTP API for the sourcing desk

mod handlers;
mod types;

pub use handlers::create_router;

use crate::engine::ConversationEngine;
use chrono::Duration;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    /// Window used by the manual cleanup endpoint and the background sweeper
    pub retention_window: Duration,
}

impl AppState {
    pub fn new(engine: ConversationEngine, retention_window: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            retention_window,
        }
    }
}
