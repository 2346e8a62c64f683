use axum::{extract::State, routing::get, Json, Router};

use crate::live::session::LiveSession;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /api/sessions — Point-in-time snapshot of all live sessions, for
/// consumers that do not hold a WebSocket subscription.
async fn sessions_snapshot(State(state): State<AppState>) -> Json<Vec<LiveSession>> {
    Json(state.live.snapshot_all())
}

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/api/sessions", get(sessions_snapshot))
        .with_state(state)
}
