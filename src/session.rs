//! # Session Persistence
//!
//! Caches the authenticated session on disk so a restart can resume the push
//! channel without logging in again, and holds the bearer credential that the
//! REST client and push channel read.
//!
//! A cache file that cannot be read or parsed is treated as if it did not
//! exist: it is removed and the failure is only logged.

use parking_lot::RwLock;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RealtimeResult;
use crate::models::Session;

/// Bearer credential slot shared between the REST client and the push channel
///
/// Written only by the session lifecycle (login/logout); everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-loaded with a token obtained outside the session lifecycle
    pub fn with_token(token: impl Into<String>) -> Self {
        let credentials = Self::new();
        credentials.install(token);
        credentials
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    pub(crate) fn install(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub(crate) fn clear(&self) {
        *self.token.write() = None;
    }
}

/// JSON file holding the last authenticated session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the cached session, resetting a corrupted cache to empty
    pub fn load(&self) -> Option<Session> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cached session");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cached session unreadable, resetting");
                self.discard();
                return None;
            }
        };

        match serde_json::from_str::<Session>(&contents) {
            Ok(session) if !session.token.trim().is_empty() => {
                debug!(user = %session.user.email, "Restored cached session");
                Some(session)
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "Cached session has an empty token, resetting");
                self.discard();
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cached session malformed, resetting");
                self.discard();
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> RealtimeResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec(session)?)?;
        info!(user = %session.user.email, path = %self.path.display(), "Session cached");
        Ok(())
    }

    pub fn clear(&self) -> RealtimeResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove corrupted session cache");
        }
    }
}
