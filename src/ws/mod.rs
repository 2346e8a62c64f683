pub mod actor;
pub mod handler;
pub mod protocol;

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique id for a transport connection. Sessions record
/// the id of the connection that last wrote them so the disconnect path can
/// tell a stale connection's death from the current writer's.
pub fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}
