//! Session data model: the identity a session is filed under, the
//! game-specific telemetry snapshot union, and the full session record
//! pushed to observers.

use serde::{Deserialize, Serialize};

/// Identity asserted by a client at `identify` time.
///
/// The `_id` is the registry key; it is a stable user id, never a transport
/// connection id, so reconnects and duplicate tabs under the same user
/// collapse to one visible session. The payload is client-asserted and not
/// re-verified here — the surrounding product authenticates elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "firstName", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role: String,
}

/// Point-in-time telemetry payload for one game, tagged by the `type`
/// discriminator the game clients send. Unknown discriminators fail
/// deserialization and are dropped at the protocol layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameSnapshot {
    #[serde(rename = "Reaction Time", rename_all = "camelCase")]
    ReactionTime {
        score: f64,
        time_remaining: f64,
        hits: u32,
        misses: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<String>,
    },
    #[serde(rename = "Line Tracing", rename_all = "camelCase")]
    LineTracing {
        score: f64,
        time_remaining: f64,
        /// Path completion, 0–100.
        progress: f64,
        /// Penalty count (the wire field is `misses` for both game types).
        misses: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
}

impl GameSnapshot {
    /// Whether the snapshot itself reports a finished round. Line-tracing
    /// clients carry a `status` field in their telemetry; a snapshot that
    /// does not claim Finished always ingests as Active, which is what lets
    /// fresh telemetry supersede a pending grace eviction.
    pub fn reports_finished(&self) -> bool {
        match self {
            GameSnapshot::ReactionTime { .. } => false,
            GameSnapshot::LineTracing { status, .. } => {
                status.as_deref() == Some("Finished")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Finished,
}

/// The live record of one identity's currently-playing game, as broadcast
/// to observers. Consumers replace by identity, never merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    pub user: Identity,
    pub game: GameSnapshot,
    pub status: SessionStatus,
    /// Unix millis of the most recent accepted telemetry.
    #[serde(rename = "lastUpdate")]
    pub last_update: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_time_snapshot_round_trips_wire_names() {
        let json = serde_json::json!({
            "type": "Reaction Time",
            "score": 50.0,
            "timeRemaining": 55.0,
            "hits": 2,
            "misses": 1,
            "mode": "Normal"
        });
        let snap: GameSnapshot = serde_json::from_value(json.clone()).unwrap();
        match &snap {
            GameSnapshot::ReactionTime { score, hits, speed, .. } => {
                assert_eq!(*score, 50.0);
                assert_eq!(*hits, 2);
                assert!(speed.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
        assert_eq!(serde_json::to_value(&snap).unwrap(), json);
    }

    #[test]
    fn line_tracing_snapshot_reports_finished_from_status() {
        let snap: GameSnapshot = serde_json::from_value(serde_json::json!({
            "type": "Line Tracing",
            "score": 80.0,
            "timeRemaining": 0.0,
            "progress": 100.0,
            "misses": 3,
            "status": "Finished"
        }))
        .unwrap();
        assert!(snap.reports_finished());

        let snap: GameSnapshot = serde_json::from_value(serde_json::json!({
            "type": "Line Tracing",
            "score": 10.0,
            "timeRemaining": 40.0,
            "progress": 12.5,
            "misses": 0
        }))
        .unwrap();
        assert!(!snap.reports_finished());
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let result: Result<GameSnapshot, _> = serde_json::from_value(serde_json::json!({
            "type": "Mind Reading",
            "score": 1.0,
            "timeRemaining": 1.0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn live_session_serializes_wire_field_names() {
        let session = LiveSession {
            user: Identity {
                id: "u1".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: None,
                role: "BCI".to_string(),
            },
            game: GameSnapshot::ReactionTime {
                score: 50.0,
                time_remaining: 55.0,
                hits: 2,
                misses: 1,
                mode: Some("Normal".to_string()),
                speed: None,
            },
            status: SessionStatus::Active,
            last_update: 1_724_800_000_000,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["user"]["_id"], "u1");
        assert_eq!(value["user"]["firstName"], "Ada");
        assert_eq!(value["game"]["type"], "Reaction Time");
        assert_eq!(value["status"], "Active");
        assert_eq!(value["lastUpdate"], 1_724_800_000_000u64);
    }
}
