//! The live feed: single-owner session registry plus observer broadcast group.
//!
//! One mutex guards both the identity→session map and the observer list, so
//! that for a fixed identity every mutation and the broadcast it triggers are
//! linearized — observers can never see events out of order for one identity,
//! and a joining observer's initial snapshot is an exact point-in-time copy.
//! None of the paths do I/O under the lock; fanout is non-blocking sends into
//! each observer connection's unbounded channel.

use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::live::clock::Clock;
use crate::live::session::{GameSnapshot, Identity, LiveSession, SessionStatus};
use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionSender;

/// Lifecycle timeouts, sourced from config.
#[derive(Debug, Clone, Copy)]
pub struct LiveTimeouts {
    pub liveness_timeout: Duration,
    pub sweep_interval: Duration,
    pub grace_period: Duration,
}

impl LiveTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            liveness_timeout: config.liveness_timeout(),
            sweep_interval: config.sweep_interval(),
            grace_period: config.grace_period(),
        }
    }
}

/// Registry entry: the broadcast-visible session plus bookkeeping that never
/// leaves the server.
struct SessionEntry {
    session: LiveSession,
    /// Generation tag, bumped on every mutation of this entry. A deferred
    /// grace eviction captures it at schedule time and only deletes if it
    /// still matches at fire time, so an entry rewritten in the interim
    /// survives the timer.
    epoch: u64,
    /// Connection that last wrote this entry. The disconnect path evicts
    /// only when the dying connection is still the last writer.
    conn_id: u64,
}

struct Inner {
    sessions: HashMap<String, SessionEntry>,
    /// Observer group, keyed by connection id. Membership is a set: joining
    /// again from the same connection replaces the prior registration.
    observers: Vec<(u64, ConnectionSender)>,
    next_epoch: u64,
}

impl Inner {
    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    /// Fan an event out to every observer, pruning sinks whose connection
    /// has gone away. Best-effort: no per-observer delivery tracking.
    fn broadcast(&mut self, event: &ServerEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast event");
                return;
            }
        };
        let msg = Message::Text(text.into());
        self.observers
            .retain(|(_, tx)| tx.send(msg.clone()).is_ok());
    }
}

/// The single authoritative owner of live session state for this process.
pub struct LiveFeed {
    clock: Arc<dyn Clock>,
    timeouts: LiveTimeouts,
    inner: Mutex<Inner>,
}

impl LiveFeed {
    pub fn new(clock: Arc<dyn Clock>, timeouts: LiveTimeouts) -> Self {
        Self {
            clock,
            timeouts,
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                observers: Vec::new(),
                next_epoch: 0,
            }),
        }
    }

    pub fn timeouts(&self) -> LiveTimeouts {
        self.timeouts
    }

    /// Upsert the session for `user` with a freshly validated snapshot and
    /// broadcast the full session to observers. Last-writer-wins: a new
    /// connection identifying as an already-present identity overwrites the
    /// entry, it never creates a second one.
    ///
    /// Returns the entry's new epoch when the snapshot itself reports a
    /// finished round, so the caller schedules the grace eviction exactly as
    /// it would after an explicit completion signal; `None` for Active
    /// telemetry. Without this, a client that self-reports Finished and then
    /// goes quiet would stay visible forever: the sweep never targets
    /// Finished sessions.
    pub fn ingest(&self, user: Identity, game: GameSnapshot, conn_id: u64) -> Option<u64> {
        let status = if game.reports_finished() {
            SessionStatus::Finished
        } else {
            SessionStatus::Active
        };

        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        // Clock read happens under the lock so lastUpdate order matches the
        // linearization order of racing ingests for one identity.
        let session = LiveSession {
            user,
            game,
            status,
            last_update: self.clock.now_millis(),
        };
        let epoch = inner.bump_epoch();
        inner.sessions.insert(
            session.user.id.clone(),
            SessionEntry {
                session: session.clone(),
                epoch,
                conn_id,
            },
        );
        inner.broadcast(&ServerEvent::LiveSessionUpdate(session));
        (status == SessionStatus::Finished).then_some(epoch)
    }

    /// Graceful completion: mark the identity's session Finished and
    /// broadcast the update. Returns the entry's new epoch so the caller can
    /// schedule the deferred eviction; `None` if no session exists (no-op).
    pub fn finish(&self, identity: &str) -> Option<u64> {
        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        let epoch = inner.bump_epoch();
        let entry = inner.sessions.get_mut(identity)?;
        entry.session.status = SessionStatus::Finished;
        entry.epoch = epoch;
        let session = entry.session.clone();
        inner.broadcast(&ServerEvent::LiveSessionUpdate(session));
        Some(epoch)
    }

    /// Schedule the deferred eviction for a session just marked Finished.
    /// The timer is never cancelled; `fire_grace_eviction` re-validates at
    /// fire time instead.
    pub fn schedule_grace_eviction(self: &Arc<Self>, identity: String, scheduled_epoch: u64) {
        let feed = Arc::clone(self);
        let grace = self.timeouts.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            feed.fire_grace_eviction(&identity, scheduled_epoch);
        });
    }

    /// Deferred grace eviction callback. Re-reads the current entry: absent,
    /// or rewritten since scheduling (newer telemetry or a later completion
    /// signal bumped the epoch) — no-op. Only an entry untouched since the
    /// completion signal is removed.
    pub fn fire_grace_eviction(&self, identity: &str, scheduled_epoch: u64) {
        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        let evict = match inner.sessions.get(identity) {
            None => false,
            Some(entry) if entry.epoch != scheduled_epoch => {
                tracing::debug!(
                    user_id = %identity,
                    "Grace eviction skipped, session superseded"
                );
                false
            }
            Some(_) => true,
        };
        if evict {
            inner.sessions.remove(identity);
            tracing::info!(user_id = %identity, "Session ended after grace period");
            inner.broadcast(&ServerEvent::SessionEnded(identity.to_string()));
        }
    }

    /// Stale sweep: evict every non-Finished session whose last telemetry is
    /// older than the liveness timeout. Finished sessions are governed solely
    /// by their grace timer and are never double-evicted here. Returns the
    /// evicted identities.
    pub fn sweep_stale(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let cutoff = self.timeouts.liveness_timeout.as_millis() as u64;

        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        let stale: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, entry)| {
                entry.session.status != SessionStatus::Finished
                    && now.saturating_sub(entry.session.last_update) > cutoff
            })
            .map(|(id, _)| id.clone())
            .collect();

        for identity in &stale {
            inner.sessions.remove(identity);
            tracing::info!(user_id = %identity, "Session evicted as stale");
            inner.broadcast(&ServerEvent::SessionEnded(identity.clone()));
        }
        stale
    }

    /// Disconnect eviction: immediate, regardless of status, but only if the
    /// dying connection is still the entry's last writer. A reconnect that
    /// already upserted a fresh session for the same identity keeps it.
    pub fn handle_disconnect(&self, identity: &str, conn_id: u64) {
        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        let evict = match inner.sessions.get(identity) {
            Some(entry) if entry.conn_id == conn_id => true,
            Some(_) => {
                tracing::debug!(
                    user_id = %identity,
                    "Disconnect ignored, session owned by a newer connection"
                );
                false
            }
            None => false,
        };
        if evict {
            inner.sessions.remove(identity);
            tracing::info!(user_id = %identity, "Session ended on disconnect");
            inner.broadcast(&ServerEvent::SessionEnded(identity.to_string()));
        }
    }

    /// Register an observer connection and push it a point-in-time snapshot
    /// of all current sessions so it can initialize without waiting for the
    /// next delta. The snapshot and the registration happen under the same
    /// lock, so no update can slip between them. Joining again from the same
    /// connection replaces the prior registration rather than adding a
    /// second one, so a re-entered admin view never receives duplicate
    /// deltas.
    pub fn observer_join(&self, conn_id: u64, tx: ConnectionSender) {
        let mut inner = self.inner.lock().expect("live feed lock poisoned");
        let snapshot: Vec<LiveSession> = inner
            .sessions
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        let init = ServerEvent::InitActiveSessions(snapshot);
        if let Ok(text) = serde_json::to_string(&init) {
            let _ = tx.send(Message::Text(text.into()));
        }
        inner.observers.retain(|(id, _)| *id != conn_id);
        inner.observers.push((conn_id, tx));
    }

    /// Point-in-time copy of all current sessions.
    pub fn snapshot_all(&self) -> Vec<LiveSession> {
        let inner = self.inner.lock().expect("live feed lock poisoned");
        inner
            .sessions
            .values()
            .map(|entry| entry.session.clone())
            .collect()
    }
}
