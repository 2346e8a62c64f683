use std::sync::Arc;

use crate::live::feed::LiveFeed;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Single-owner live session registry and observer group
    pub live: Arc<LiveFeed>,
}
