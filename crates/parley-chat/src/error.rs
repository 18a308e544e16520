//! Error types for the conversation engine.

use parley_core::error::ParleyError;

/// Errors from the chat engine.
///
/// `LookupFailed`, `InferenceFailed` and `Unresolved` are handled inside a
/// turn and surface to the user as bot messages. Only `TurnInFlight` and
/// `State` are returned from the event entry points.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("response lookup failed: {0}")]
    LookupFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("no response matched: {0}")]
    Unresolved(String),
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("session state error: {0}")]
    State(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ParleyError> for ChatError {
    fn from(err: ParleyError) -> Self {
        ChatError::Config(err.to_string())
    }
}
