//! In-memory session store keyed by the `phodong_session` cookie.
//! Entries are only touched inside [`SessionStore::with`]; nothing holds a map guard across `.await`.
//! Only [`SessionStore::create`] adds entries; idle ones are dropped by [`SessionStore::sweep_idle`].

use axum::http::{header::COOKIE, HeaderMap};
use dashmap::DashMap;
use phodong_core::Session;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "phodong_session";

struct Entry {
    session: Session,
    touched: Instant,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Entry>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh empty session under a new id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            Entry {
                session: Session::new(),
                touched: Instant::now(),
            },
        );
        tracing::info!(session = %id, "New session");
        id
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Run `f` against a live session and mark it as used. `None` for an unknown or evicted id.
    pub fn with<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut entry = self.sessions.get_mut(&id)?;
        entry.touched = Instant::now();
        Some(f(&mut entry.session))
    }

    /// Drop sessions unused for longer than `max_idle`. Returns how many went.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        match Instant::now().checked_sub(max_idle) {
            Some(cutoff) => self.sweep_older_than(cutoff),
            None => 0,
        }
    }

    fn sweep_older_than(&self, cutoff: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.touched > cutoff);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Session id from the request's `Cookie` headers, if present and well-formed.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}
