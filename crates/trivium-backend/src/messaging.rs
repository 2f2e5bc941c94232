//! Session-scoped message dispatch over long-lived client channels.
//!
//! The [`Dispatcher`] owns the per-session connection registries and the
//! three send primitives: personal (one user), session broadcast (everyone
//! connected), and role-filtered broadcast (host only / participants only).
//!
//! # Connection model
//!
//! Each `(session, user)` pair has at most one connection. Registering a
//! second connection for the same pair displaces the first: the old
//! outbound channel is dropped, which the old socket task observes as a
//! closed receiver and shuts down.
//!
//! Every connection gets a bounded outbound queue. A send that cannot
//! complete within the configured timeout marks the client as slow; it is
//! disconnected and removed from the registry while the remaining
//! recipients proceed. Broadcasts snapshot the registry and fan out in
//! parallel, so no registry guard is ever held across a network send.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use trivium::{
    data::ServerMessage,
    id::{SessionCode, UserId},
    log, serde_json,
};

/// Default per-connection send timeout before a slow client is dropped.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound of each connection's outbound queue.
const OUTBOUND_BUFFER: usize = 32;

/// A frame queued for delivery to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized `{type, payload}` envelope.
    Json(String),
    /// Ask the socket task to close with 1001 Going Away.
    GoingAway,
}

/// Which connections a broadcast reaches. Quiz flows broadcast to every
/// connected channel regardless of role; the role filters are the
/// dispatch layer's host-targeted and participant-targeted primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    #[allow(dead_code)]
    HostOnly,
    #[allow(dead_code)]
    ParticipantsOnly,
}

#[derive(Clone)]
struct ConnectionHandle {
    conn_id: u64,
    is_host: bool,
    tx: mpsc::Sender<Outbound>,
}

/// Handed to the socket task on register: its identity for cleanup and the
/// receiving end of its outbound queue.
pub struct Registration {
    pub conn_id: u64,
    pub rx: mpsc::Receiver<Outbound>,
}

pub struct Dispatcher {
    /// Per-session connection registry, `code → user → handle`.
    connections: DashMap<SessionCode, HashMap<UserId, ConnectionHandle>>,
    next_conn_id: AtomicU64,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Registers a connection for `(code, user)`, displacing any previous
    /// connection for the same pair.
    pub fn register(&self, code: &SessionCode, user_id: &UserId, is_host: bool) -> Registration {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);

        let mut session = self.connections.entry(code.clone()).or_default();
        let displaced = session.insert(
            user_id.clone(),
            ConnectionHandle {
                conn_id,
                is_host,
                tx,
            },
        );
        drop(session);

        if displaced.is_some() {
            log::debug!("Displaced previous connection for {user_id} in session {code}");
        }
        log::debug!("Registered connection {conn_id} for {user_id} in session {code} (host={is_host})");

        Registration { conn_id, rx }
    }

    /// Removes a connection, but only if it is still the current one for
    /// the pair. A displaced connection's late cleanup must not unregister
    /// its replacement.
    pub fn unregister(&self, code: &SessionCode, user_id: &UserId, conn_id: u64) -> bool {
        let Some(mut session) = self.connections.get_mut(code) else {
            return false;
        };
        let removed = match session.get(user_id) {
            Some(handle) if handle.conn_id == conn_id => {
                session.remove(user_id);
                true
            }
            _ => false,
        };
        let empty = session.is_empty();
        drop(session);

        if empty {
            self.connections
                .remove_if(code, |_, session| session.is_empty());
        }
        removed
    }

    /// Number of connections currently registered for a session.
    pub fn connection_count(&self, code: &SessionCode) -> usize {
        self.connections.get(code).map_or(0, |s| s.len())
    }

    /// Sends a message to one user. Returns false when the user has no
    /// connection or the send timed out (in which case the connection is
    /// dropped from the registry).
    pub async fn send_personal(
        &self,
        code: &SessionCode,
        user_id: &UserId,
        message: &ServerMessage,
    ) -> bool {
        let Some(json) = encode(message) else {
            return false;
        };
        let handle = self
            .connections
            .get(code)
            .and_then(|session| session.get(user_id).cloned());

        match handle {
            Some(handle) => {
                if self.deliver(&handle, Outbound::Json(json)).await {
                    true
                } else {
                    log::warn!("Dropping slow or closed connection for {user_id} in session {code}");
                    self.unregister(code, user_id, handle.conn_id);
                    false
                }
            }
            None => {
                log::debug!("No connection for {user_id} in session {code}");
                false
            }
        }
    }

    /// Broadcasts a message to every connection in a session.
    pub async fn broadcast(&self, code: &SessionCode, message: &ServerMessage) {
        self.broadcast_filtered(code, message, Audience::All).await;
    }

    /// Broadcasts a message to the subset of a session's connections that
    /// matches the audience filter. The fan-out is parallel; one slow
    /// recipient delays nobody else and is dropped on timeout.
    pub async fn broadcast_filtered(
        &self,
        code: &SessionCode,
        message: &ServerMessage,
        audience: Audience,
    ) {
        let Some(json) = encode(message) else {
            return;
        };

        // Snapshot the recipients so the registry guard is released before
        // any send happens.
        let targets: Vec<(UserId, ConnectionHandle)> = match self.connections.get(code) {
            Some(session) => session
                .iter()
                .filter(|(_, handle)| match audience {
                    Audience::All => true,
                    Audience::HostOnly => handle.is_host,
                    Audience::ParticipantsOnly => !handle.is_host,
                })
                .map(|(user, handle)| (user.clone(), handle.clone()))
                .collect(),
            None => return,
        };

        let mut sends = JoinSet::new();
        for (user_id, handle) in targets {
            let json = json.clone();
            let timeout = self.send_timeout;
            sends.spawn(async move {
                let delivered = handle
                    .tx
                    .send_timeout(Outbound::Json(json), timeout)
                    .await
                    .is_ok();
                (user_id, handle.conn_id, delivered)
            });
        }

        while let Some(result) = sends.join_next().await {
            let Ok((user_id, conn_id, delivered)) = result else {
                continue;
            };
            if !delivered {
                log::warn!("Dropping slow or closed connection for {user_id} in session {code}");
                self.unregister(code, &user_id, conn_id);
            }
        }
    }

    /// Asks every open connection to close with 1001 Going Away and clears
    /// the registries. Used on graceful shutdown.
    pub async fn close_all(&self) {
        let targets: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .flat_map(|session| session.values().cloned().collect::<Vec<_>>())
            .collect();
        self.connections.clear();

        for handle in targets {
            // Best effort; a stuck connection is torn down by the server
            // shutdown anyway.
            let _ = handle
                .tx
                .send_timeout(Outbound::GoingAway, self.send_timeout)
                .await;
        }
    }

    async fn deliver(&self, handle: &ConnectionHandle, frame: Outbound) -> bool {
        handle
            .tx
            .send_timeout(frame, self.send_timeout)
            .await
            .is_ok()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(SEND_TIMEOUT)
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            log::error!("Failed to serialize outbound message: {e}");
            None
        }
    }
}
