use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::session::{Session, SessionController};

/// Sessions untouched for this long are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A session's turns run one at a time, so each one gets its own lock.
pub type SharedSession = Arc<Mutex<Session>>;

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

pub struct AppState {
    pub controller: SessionController,
    sessions: HashMap<String, SessionEntry>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            sessions: HashMap::new(),
            idle_timeout: SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Get the session by ID, creating it if it doesn't already exist
    pub fn session(&mut self, id: &str) -> SharedSession {
        self.evict_idle();
        let entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Arc::new(Mutex::new(Session::new(id))),
                last_used: Instant::now(),
            });
        entry.last_used = Instant::now();
        Arc::clone(&entry.session)
    }

    /// End a session. Returns false if there was no such session.
    pub fn remove_session(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle past the timeout. Sessions in the middle of
    /// a turn are kept.
    fn evict_idle(&mut self) {
        let idle_timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            entry.last_used.elapsed() < idle_timeout || Arc::strong_count(&entry.session) > 1
        });
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
    }
}
