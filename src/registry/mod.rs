//! Client registry
//!
//! The shared, lock-protected collection of all live sessions. One mutex
//! guards both the structure and every full scan over it, so a traversal can
//! never observe a session whose connection is concurrently being closed.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::session::{Session, SessionId};

/// The registry as shared between the accept loop and all session handlers.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// Registry of active sessions, keyed by session id.
///
/// The registry exclusively owns the existence record of each session;
/// closing of the underlying connection happens exactly once, inside
/// [`ClientRegistry::remove`].
pub struct ClientRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Inserts a new session. Ids come from an atomic counter, so a
    /// duplicate insert indicates a registry invariant violation.
    pub fn add(&mut self, session: Session) {
        info!("Client added: {} [{}]", session.addr(), session.id());
        let _previous = self.sessions.insert(session.id(), session);
        debug_assert!(_previous.is_none(), "duplicate session id in registry");
    }

    /// Removes a session by id, closing its connection. No-op when the id is
    /// absent, which makes the operation idempotent: a second call for the
    /// same id finds no entry and closes nothing.
    pub async fn remove(&mut self, id: SessionId) {
        if let Some(mut session) = self.sessions.remove(&id) {
            info!("Removing client: {} [{}]", session.addr(), id);
            session.close().await;
        }
    }

    /// Looks up a session by id. The borrow is only valid while the caller
    /// holds the registry lock.
    pub fn find(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn find_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Iterates over every session other than `exclude`. Callers fold over
    /// the sequence and may abort on the first error.
    pub fn iter_except(&self, exclude: SessionId) -> impl Iterator<Item = &Session> {
        self.sessions
            .values()
            .filter(move |session| session.id() != exclude)
    }

    pub fn iter_except_mut(&mut self, exclude: SessionId) -> impl Iterator<Item = &mut Session> {
        self.sessions
            .values_mut()
            .filter(move |session| session.id() != exclude)
    }

    /// Closes and drops every session. Server shutdown path.
    pub async fn drain(&mut self) {
        for (_, mut session) in self.sessions.drain() {
            session.close().await;
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
