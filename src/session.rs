//! Locally persisted session credential.
//!
//! The controller only reads the credential (once per fetch) and clears it
//! when the backend reports the session as expired. Login lives elsewhere.

use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

pub trait SessionStore: Send + Sync {
    /// Bearer token for the current session, if any.
    fn credential(&self) -> Option<String>;

    /// Forget the session.
    fn clear(&self);
}

/// Token kept in a file on disk, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn credential(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read session token");
                None
            }
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove session token"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn credential(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn clear(&self) {
        *self.token.lock() = None;
    }
}
