//! Resumable session state and the store it is checkpointed to.
//!
//! A session is keyed by (user, mode). The orchestrator loads it on connect
//! and saves it on disconnect if the match is still in progress.

use crate::physics::Placement;
use pong_shared::config::TOURNAMENT_PLAYERS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Normal,
    Tournament,
}

impl GameMode {
    /// Anything other than `tournament` is a normal match.
    pub fn from_param(value: &str) -> Self {
        if value == "tournament" {
            GameMode::Tournament
        } else {
            GameMode::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Normal => "normal",
            GameMode::Tournament => "tournament",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user: String,
    pub mode: GameMode,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, mode: GameMode) -> Self {
        Self {
            user: user.into(),
            mode,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_data_{}_{}", self.mode.as_str(), self.user)
    }
}

/// Everything needed to resume a match or tournament after an interruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionBlob {
    pub game_mode: GameMode,
    pub players_name: Vec<String>,
    pub left_score: u32,
    pub right_score: u32,
    pub round: u8,
    /// Round winners so far, oldest first.
    pub win_history: Vec<String>,
    /// Ball and paddles; None means kick off from the centre.
    pub placement: Option<Placement>,
}

impl Default for SessionBlob {
    fn default() -> Self {
        Self::fresh(GameMode::Normal)
    }
}

impl SessionBlob {
    pub fn fresh(game_mode: GameMode) -> Self {
        Self {
            game_mode,
            players_name: default_players(),
            left_score: 0,
            right_score: 0,
            round: 1,
            win_history: Vec::new(),
            placement: None,
        }
    }
}

pub fn default_players() -> Vec<String> {
    (1..=TOURNAMENT_PLAYERS).map(|i| format!("player{}", i)).collect()
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// External key/value store for session blobs.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &SessionKey) -> Result<Option<SessionBlob>, SessionStoreError>;
    fn save(
        &self,
        key: &SessionKey,
        blob: &SessionBlob,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;
    fn delete(&self, key: &SessionKey) -> Result<(), SessionStoreError>;
}

/// Load a session, falling back to a fresh one when absent or unreadable.
pub fn load_or_fresh(store: &dyn SessionStore, key: &SessionKey) -> SessionBlob {
    match store.load(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => SessionBlob::fresh(key.mode),
        Err(e) => {
            tracing::warn!("Loading {} failed, starting fresh: {}", key, e);
            SessionBlob::fresh(key.mode)
        }
    }
}

struct Entry {
    payload: String,
    expires_at: Instant,
}

/// In-process store holding serialized blobs with a per-entry expiry.
/// Expired entries are dropped lazily when read.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<SessionKey, Entry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionKey, Entry>>, SessionStoreError> {
        self.entries
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &SessionKey) -> Result<Option<SessionBlob>, SessionStoreError> {
        let mut entries = self.lock()?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            entries.remove(key);
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&entry.payload)?))
    }

    fn save(
        &self,
        key: &SessionKey,
        blob: &SessionBlob,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let payload = serde_json::to_string(blob)?;
        let entry = Entry {
            payload,
            expires_at: Instant::now() + ttl,
        };
        self.lock()?.insert(key.clone(), entry);
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<(), SessionStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
