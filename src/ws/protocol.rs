//! JSON message envelope and per-connection dispatch.
//!
//! Frames are adjacently tagged: `{"event": <name>, "data": <payload>}`,
//! with `data` omitted for payload-less events. This is the event vocabulary
//! the game clients and the admin dashboard speak.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::live::session::{GameSnapshot, Identity, LiveSession};
use crate::state::AppState;

/// Client → server messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to an asserted identity.
    Identify(Identity),
    /// Telemetry snapshot. Kept as raw JSON here so an unknown game type is
    /// reported as a snapshot problem, not an envelope problem.
    GameUpdate(serde_json::Value),
    /// Graceful completion signal.
    GameEnd,
    /// Subscribe this connection to the observer broadcast group.
    AdminJoin,
}

/// Server → observer events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot sent once when an observer joins.
    InitActiveSessions(Vec<LiveSession>),
    /// One full session; observers replace by identity, never merge.
    LiveSessionUpdate(LiveSession),
    /// Identity whose session was evicted.
    SessionEnded(String),
}

/// Per-connection context. The identity binding is a one-way pointer from
/// connection to identity, set once `identify` succeeds; the registry never
/// maps back from identities to connections.
pub struct ConnectionContext {
    pub conn_id: u64,
    pub identity: Option<Identity>,
}

impl ConnectionContext {
    pub fn new(conn_id: u64) -> Self {
        Self {
            conn_id,
            identity: None,
        }
    }
}

/// Handle one incoming text frame: decode the envelope and dispatch.
pub fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    ctx: &mut ConnectionContext,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                conn_id = ctx.conn_id,
                error = %e,
                "Failed to decode client message, dropping"
            );
            return;
        }
    };

    match message {
        ClientMessage::Identify(identity) => {
            tracing::info!(
                conn_id = ctx.conn_id,
                user_id = %identity.id,
                role = %identity.role,
                "Connection identified"
            );
            ctx.identity = Some(identity);
        }
        ClientMessage::GameUpdate(raw) => {
            // Telemetry before a successful identify is silently dropped so
            // half-identified sessions never reach the registry.
            let Some(identity) = ctx.identity.clone() else {
                tracing::trace!(conn_id = ctx.conn_id, "Telemetry before identify, dropped");
                return;
            };
            let snapshot: GameSnapshot = match serde_json::from_value(raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        conn_id = ctx.conn_id,
                        user_id = %identity.id,
                        error = %e,
                        "Unknown or malformed game snapshot, dropping"
                    );
                    return;
                }
            };
            let user_id = identity.id.clone();
            // Telemetry that self-reports a finished round gets the same
            // bounded visibility as an explicit game_end.
            if let Some(epoch) = state.live.ingest(identity, snapshot, ctx.conn_id) {
                tracing::info!(user_id = %user_id, "Telemetry reported finish, grace eviction scheduled");
                state.live.schedule_grace_eviction(user_id, epoch);
            }
        }
        ClientMessage::GameEnd => {
            let Some(identity) = &ctx.identity else {
                return;
            };
            if let Some(epoch) = state.live.finish(&identity.id) {
                tracing::info!(user_id = %identity.id, "Game finished, grace eviction scheduled");
                state
                    .live
                    .schedule_grace_eviction(identity.id.clone(), epoch);
            }
        }
        ClientMessage::AdminJoin => {
            tracing::info!(conn_id = ctx.conn_id, "Observer joined live feed");
            state.live.observer_join(ctx.conn_id, tx.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_identify() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"identify","data":{"_id":"u1","firstName":"Ada","role":"USER"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Identify(identity) => {
                assert_eq!(identity.id, "u1");
                assert_eq!(identity.first_name.as_deref(), Some("Ada"));
                assert!(identity.last_name.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn envelope_decodes_payloadless_events() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"event":"game_end"}"#).unwrap(),
            ClientMessage::GameEnd
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"event":"admin_join"}"#).unwrap(),
            ClientMessage::AdminJoin
        ));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"self_destruct"}"#).is_err());
    }

    #[test]
    fn session_ended_event_carries_identity_only() {
        let event = ServerEvent::SessionEnded("u1".to_string());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "session_ended");
        assert_eq!(value["data"], "u1");
    }
}
