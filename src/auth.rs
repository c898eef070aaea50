//! Operator login sessions for the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserAccount {
    pub username: String,
    /// Plain text or the lowercase SHA-256 hex digest.
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub name: String,
}

#[derive(Clone, Debug)]
struct Session {
    user: AuthenticatedUser,
    expires_at: DateTime<Utc>,
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Matches `username`/`password` against the configured accounts.
pub fn validate_credentials(
    username: &str,
    password: &str,
    users: &[UserAccount],
) -> Option<AuthenticatedUser> {
    let user = users.iter().find(|u| u.username == username)?;
    if user.password == password || user.password.eq_ignore_ascii_case(&hash_password(password)) {
        Some(AuthenticatedUser {
            username: user.username.clone(),
            name: user.name.clone().unwrap_or_else(|| user.username.clone()),
        })
    } else {
        None
    }
}

/// In-memory bearer token store with expiry.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: ChronoDuration,
}

impl SessionStore {
    pub fn new(ttl: ChronoDuration) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            ttl,
        })
    }

    pub fn create(&self, user: AuthenticatedUser) -> String {
        let token = generate_token();
        self.sessions.insert(
            token.clone(),
            Session {
                user,
                expires_at: Utc::now() + self.ttl,
            },
        );
        token
    }

    /// Returns the session's user, dropping the session if it expired.
    pub fn validate(&self, token: &str) -> Option<AuthenticatedUser> {
        let expired = match self.sessions.get(token) {
            None => return None,
            Some(session) if Utc::now() <= session.expires_at => {
                return Some(session.user.clone());
            }
            Some(_) => true,
        };
        if expired {
            self.sessions.remove(token);
        }
        None
    }

    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at >= now);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Purges expired sessions every hour until the handle is aborted.
    pub fn spawn_purge(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(removed, "purged expired sessions");
                }
            }
        })
    }
}
