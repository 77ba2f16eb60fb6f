// ============================
// watchparty-backend/src/auth/session.rs
// ============================
//! Live connection directory: which user and party each authenticated connection belongs to.
use dashmap::DashMap;
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

/// Identifier of one realtime connection
pub type ConnectionId = Uuid;

/// Binding of an authenticated connection
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub username: String,
    pub party_id: String,
    pub connected_at: SystemTime,
}

impl Session {
    pub fn new(username: impl Into<String>, party_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            party_id: party_id.into(),
            connected_at: SystemTime::now(),
        }
    }
}

/// Directory of authenticated connections
#[derive(Clone, Default)]
pub struct SessionDirectory {
    sessions: Arc<DashMap<ConnectionId, Session>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly authenticated connection
    pub fn insert(&self, connection: ConnectionId, session: Session) {
        self.sessions.insert(connection, session);
    }

    pub fn get(&self, connection: &ConnectionId) -> Option<Session> {
        self.sessions.get(connection).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, connection: &ConnectionId) -> Option<Session> {
        self.sessions.remove(connection).map(|(_, session)| session)
    }

    /// Connections currently bound to `party_id`
    pub fn connections_in(&self, party_id: &str) -> Vec<ConnectionId> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().party_id == party_id)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
