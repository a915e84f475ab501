//! Cookie-backed session store.
//!
//! # Responsibilities
//! - Resolve an incoming cookie to the session values and auth state
//! - Persist session mutations made by the handler chain
//! - Expire idle sessions
//!
//! # Design Decisions
//! - DashMap keeps lookups lock-free on the request path
//! - A session is authenticated iff its values carry a truthy
//!   `authenticated` key; handlers toggle auth state by mutating the
//!   session document
//! - Expiry is checked lazily on lookup; there is no sweeper task

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Session values plus the derived auth state.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub values: Value,
    pub authenticated: bool,
}

#[derive(Debug)]
struct SessionSlot {
    data: SessionData,
    last_seen: Instant,
}

/// The app-wide session store.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionSlot>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Resolve the session named by the request's cookie header, bumping
    /// its idle timer. Expired sessions are dropped here.
    pub fn lookup(
        &self,
        cookie_header: Option<&str>,
        cookie_name: &str,
    ) -> Option<(String, SessionData)> {
        let id = cookie_value(cookie_header?, cookie_name)?;

        let expired = match self.sessions.get_mut(id) {
            Some(mut slot) => {
                if slot.last_seen.elapsed() <= self.ttl {
                    slot.last_seen = Instant::now();
                    return Some((id.to_string(), slot.data.clone()));
                }
                true
            }
            None => false,
        };
        if expired {
            self.sessions.remove(id);
            debug!(session = id, "expired session dropped");
        }
        None
    }

    /// Create a fresh session and return its id.
    pub fn create(&self, values: Value) -> String {
        let id = Uuid::new_v4().to_string();
        self.save(&id, values);
        id
    }

    /// Persist the chain's session document. Auth state is derived from the
    /// values themselves.
    pub fn save(&self, id: &str, values: Value) {
        let authenticated = values
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.sessions.insert(
            id.to_string(),
            SessionSlot {
                data: SessionData {
                    values,
                    authenticated,
                },
                last_seen: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

/// Pull one cookie's value out of a `Cookie:` header.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// An empty session document.
pub fn empty_session() -> Value {
    Value::Object(Map::new())
}
