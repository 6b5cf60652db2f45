use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use narrator_core::{Config, Orchestrator, Services};

/// One independent pipeline per upload.
pub type Session = Arc<Mutex<Orchestrator>>;

pub const DEFAULT_MAX_SESSIONS: usize = 64;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// A stored session and when a request last touched it.
pub struct SessionEntry {
    session: Session,
    /// Milliseconds since `AppState::epoch`.
    last_access: AtomicU64,
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    /// Stateless service clients shared by every session.
    pub services: Services,
    /// Defaults each new session starts from.
    pub config: Config,
    pub sessions: DashMap<String, SessionEntry>,
    max_sessions: usize,
    session_ttl: Duration,
    epoch: Instant,
}

impl AppState {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services,
            config,
            sessions: DashMap::new(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_ttl: DEFAULT_SESSION_TTL,
            epoch: Instant::now(),
        }
    }

    /// Cap the number of live sessions and how long an idle one is kept.
    pub fn with_limits(mut self, max_sessions: usize, session_ttl: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.session_ttl = session_ttl;
        self
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Look up a session and mark it as used.
    pub fn session(&self, id: &str) -> Option<Session> {
        let entry = self.sessions.get(id)?;
        entry.last_access.store(self.now_millis(), Ordering::Relaxed);
        Some(Arc::clone(&entry.session))
    }

    /// Store `orchestrator` under a fresh random id, first dropping expired
    /// sessions and, at capacity, the least recently used one.
    pub fn insert_session(&self, orchestrator: Orchestrator) -> String {
        self.evict();
        let now = self.now_millis();
        loop {
            let id = format!("{:016x}", fastrand::u64(..));
            if let dashmap::mapref::entry::Entry::Vacant(entry) = self.sessions.entry(id.clone()) {
                entry.insert(SessionEntry {
                    session: Arc::new(Mutex::new(orchestrator)),
                    last_access: AtomicU64::new(now),
                });
                return id;
            }
        }
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn evict(&self) {
        let now = self.now_millis();
        let ttl = self.session_ttl.as_millis() as u64;
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) < ttl
        });
        let expired = before.saturating_sub(self.sessions.len());
        if expired > 0 {
            tracing::info!(expired, "dropped idle sessions");
        }

        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|e| e.last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match oldest {
                Some(id) => {
                    tracing::info!(session = %id, "evicting least recently used session");
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }
    }
}
