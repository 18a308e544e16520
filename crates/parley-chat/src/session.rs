//! Session-scoped widget state.
//!
//! One `WidgetSession` exists per widget instance. It owns the session
//! token, the response cache, the option tracker and the turn list; the
//! resolver borrows it explicitly rather than reaching for globals.

use std::fmt;

use parley_core::{CachePolicy, Turn};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::cache::ResponseCache;
use crate::tracker::OptionTracker;

const TOKEN_PREFIX: &str = "section-";
const TOKEN_RANDOM_LEN: usize = 9;

// =============================================================================
// SessionToken
// =============================================================================

/// Opaque identifier grouping all backend calls of one widget instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token: a fixed prefix plus 9 random lowercase
    /// alphanumeric characters.
    pub fn generate() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_RANDOM_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("{}{}", TOKEN_PREFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SessionIdentity
// =============================================================================

/// Holds the session token, creating it at most once.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    token: Option<SessionToken>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session token, generating it on first use.
    pub fn ensure_session(&mut self) -> SessionToken {
        self.token
            .get_or_insert_with(|| {
                let token = SessionToken::generate();
                info!(session_id = %token, "Session token generated");
                token
            })
            .clone()
    }

    /// The current token, if one has been generated.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }
}

// =============================================================================
// WidgetSession
// =============================================================================

/// All mutable conversation state of one widget instance.
#[derive(Debug)]
pub struct WidgetSession {
    pub identity: SessionIdentity,
    pub cache: ResponseCache,
    pub tracker: OptionTracker,
    pub turns: Vec<Turn>,
}

impl WidgetSession {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            identity: SessionIdentity::new(),
            cache: ResponseCache::new(policy),
            tracker: OptionTracker::new(),
            turns: Vec::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
