//! Server-held sessions with one lock per attempt.
//!
//! A single `AttemptSession` is not meant for concurrent writers. When many
//! attempts are held by a server, each one sits behind its own async mutex:
//! mutations of the same attempt are serialized (including across a
//! collaborator await), while different attempts proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SessionError;
use crate::model::AttemptId;
use crate::session::AttemptSession;

/// A session shared between request handlers.
pub type SharedSession = Arc<tokio::sync::Mutex<AttemptSession>>;

/// Registry of live sessions keyed by attempt id.
pub struct SessionRegistry {
    page_size: usize,
    sessions: Mutex<HashMap<AttemptId, SharedSession>>,
}

impl SessionRegistry {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session for `attempt_id`, creating and initializing it if
    /// it does not exist yet.
    pub fn open(&self, attempt_id: &str) -> Result<SharedSession, SessionError> {
        let id: AttemptId = attempt_id.parse()?;
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(&id) {
            return Ok(Arc::clone(existing));
        }

        let mut session = AttemptSession::new(self.page_size);
        session.initialize(attempt_id)?;
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        sessions.insert(id, Arc::clone(&shared));
        tracing::debug!(attempt_id = %id, live = sessions.len(), "session registered");
        Ok(shared)
    }

    pub fn get(&self, attempt_id: &AttemptId) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(attempt_id)
            .cloned()
    }

    /// Drop a session from the registry. Handlers still holding it keep a
    /// valid reference until they release it.
    pub fn remove(&self, attempt_id: &AttemptId) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(attempt_id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
