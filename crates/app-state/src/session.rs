//! Optimistic session hint
//!
//! The hint is the locally remembered identity of the last sign-in on this
//! device. It lets a page show its signed-in state before the identity
//! service has confirmed the live session, and it is never authoritative.
//!
//! Invalidation rule: the hint (and everything else in the local store) is
//! cleared on logout, when the live session belongs to another email, and
//! when the identity service reports no live session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use storage::{KvError, LocalStore};

/// Local store key holding the remembered email
pub const EMAIL_KEY: &str = "email";

/// Local store key holding the remembered post count
pub const POSTS_KEY: &str = "posts";

/// Session hint errors
#[derive(Debug, thiserror::Error)]
pub enum SessionHintError {
    /// Local store failure
    #[error("Local storage error: {0}")]
    Storage(#[from] KvError),
}

/// Result type for session hint operations
pub type Result<T> = std::result::Result<T, SessionHintError>;

/// Last known signed-in identity on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHint {
    /// Email of the identity
    pub email: String,
    /// Number of posts the identity had authored when last read
    pub post_count: u32,
}

impl SessionHint {
    /// Create a new hint
    pub fn new(email: impl Into<String>, post_count: u32) -> Self {
        Self { email: email.into(), post_count }
    }
}

/// Why a hint was discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The user logged out
    Logout,
    /// The live session belongs to a different identity
    Mismatch {
        /// Email in the hint
        cached: String,
        /// Email of the live session
        live: String,
    },
    /// The identity service reports no live session
    NoBackendSession,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Logout => write!(f, "logout"),
            InvalidationReason::Mismatch { cached, live } => {
                write!(f, "session belongs to {} but {} was remembered", live, cached)
            }
            InvalidationReason::NoBackendSession => write!(f, "no live session"),
        }
    }
}

/// Reads and writes the session hint in the local store
#[derive(Clone)]
pub struct HintStore {
    store: Arc<dyn LocalStore>,
}

impl HintStore {
    /// Create a hint store on top of a local store
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Load the hint, if an email is remembered
    pub fn load(&self) -> Result<Option<SessionHint>> {
        let Some(email) = self.store.get(EMAIL_KEY)? else {
            return Ok(None);
        };

        let post_count = match self.store.get(POSTS_KEY)? {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring unreadable cached post count {:?}", raw);
                0
            }),
            None => 0,
        };

        Ok(Some(SessionHint { email, post_count }))
    }

    /// Remembered email, if any
    pub fn cached_email(&self) -> Result<Option<String>> {
        Ok(self.store.get(EMAIL_KEY)?)
    }

    /// Remember a signed-in identity
    pub fn remember(&self, hint: &SessionHint) -> Result<()> {
        self.store.set(EMAIL_KEY, &hint.email)?;
        self.store.set(POSTS_KEY, &hint.post_count.to_string())?;
        tracing::debug!("Remembered session hint for {}", hint.email);
        Ok(())
    }

    /// Update the remembered post count, if a hint exists
    pub fn set_post_count(&self, post_count: u32) -> Result<()> {
        if self.store.get(EMAIL_KEY)?.is_some() {
            self.store.set(POSTS_KEY, &post_count.to_string())?;
        }
        Ok(())
    }

    /// Discard the hint and the rest of the local store
    pub fn invalidate(&self, reason: &InvalidationReason) -> Result<()> {
        tracing::info!("Clearing session hint: {}", reason);
        self.store.clear()?;
        Ok(())
    }
}
