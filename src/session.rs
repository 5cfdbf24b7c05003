//! In-memory session management.
//!
//! Sessions live for the process lifetime only; nothing is persisted across
//! restarts. Concurrent writers to the same session serialize on the store
//! lock, beyond which last-writer-wins applies.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Owner assigned when a request carries no user identity.
pub const DEFAULT_USER_ID: &str = "default_user";

// ============================================================================
// Session
// ============================================================================

/// Role tag on a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Model,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Model => write!(f, "model"),
        }
    }
}

/// One entry in a session's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A conversation session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub turns: Vec<Turn>,
    pub state: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sessions are scoped per owning user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    user_id: String,
    session_id: String,
}

// ============================================================================
// SessionStore
// ============================================================================

/// In-memory session store keyed by (user, session).
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, Session>>>,
}

impl SessionStore {
    /// Create a new empty session store.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the session for (user, id), creating an empty one on first
    /// reference.
    pub async fn get_or_create(&self, user_id: &str, session_id: &str) -> Session {
        let key = SessionKey {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        };

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key)
            .or_insert_with(|| {
                let now = Utc::now();
                Session {
                    id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    turns: Vec::new(),
                    state: HashMap::new(),
                    created_at: now,
                    updated_at: now,
                }
            })
            .clone()
    }

    /// Get a session by (user, id).
    pub async fn get(&self, user_id: &str, session_id: &str) -> Option<Session> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        };
        let sessions = self.sessions.read().await;
        sessions.get(&key).cloned()
    }

    /// Append a turn to a session and update the timestamp.
    pub async fn append_turn(&self, user_id: &str, session_id: &str, turn: Turn) -> Option<()> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        };
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&key)?;
        session.turns.push(turn);
        session.updated_at = Utc::now();
        Some(())
    }

    /// Number of turns recorded for a session, if it exists.
    pub async fn turn_count(&self, user_id: &str, session_id: &str) -> Option<usize> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        };
        let sessions = self.sessions.read().await;
        sessions.get(&key).map(|s| s.turns.len())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
