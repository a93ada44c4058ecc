//! Server error types.

use std::fmt;

use buzzer_core::ControllerError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, zero durations, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, socket I/O, etc.).
    ///
    /// Fatal for the affected connection only; the server keeps serving
    /// everyone else.
    Transport(String),

    /// Internal error (snapshot serialization, unexpected state).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    Internal(String),

    /// Controller error (rejected control command).
    ///
    /// Wraps errors from the controller. See `ControllerError` for details.
    Controller(ControllerError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Controller(err) => write!(f, "controller error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Controller(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ControllerError> for ServerError {
    fn from(err: ControllerError) -> Self {
        Self::Controller(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("snapshot serialization failed: {err}"))
    }
}
