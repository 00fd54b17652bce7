//! Error types for the bridge core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by the publisher and command collaborators.
///
/// These are per-event conditions: the bridge loop logs them and moves
/// on, it never aborts the stream. Normal branches such as a first
/// observation or a suppressed value are not errors, and advisory
/// conditions (malformed payloads, unknown variables) are logged where
/// they are detected rather than raised.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The telemetry publisher could not accept a publication.
    #[error("Failed to publish to scope '{scope}': {message}")]
    Publish { scope: String, message: String },

    /// A command payload could not be converted or delivered.
    #[error("Command error: {0}")]
    Command(String),
}

impl CoreError {
    pub fn publish(scope: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Publish {
            scope: scope.into(),
            message: message.to_string(),
        }
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }
}
