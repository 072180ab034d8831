//! The error taxonomy from §7: result-typed throughout, nothing panics on a
//! recoverable condition.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: method {method} not found")]
    MethodNotFound { method: String },

    #[error("invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },

    #[error("{0}")]
    Engine(#[from] enginewire_types::WireError),

    #[error("{0}")]
    Timeout(TimeoutKind),

    #[error("{0}")]
    TargetState(#[from] TargetStateError),

    #[error("evaluation exception: {0}")]
    Evaluation(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("session is closed")]
    Closed,

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Adds operation context the way C5/C6/C7/C8 are required to (§7
    /// "never swallow errors; they add context").
    pub fn with_context(self, context: impl std::fmt::Display) -> Error {
        match self {
            Error::Internal(msg) => Error::Internal(format!("{context}: {msg}")),
            other => Error::Internal(format!("{context}: {other}")),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    #[error("wire protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Command,
    Wait,
    Navigation,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Command => write!(f, "command timed out"),
            TimeoutKind::Wait => write!(f, "wait timed out"),
            TimeoutKind::Navigation => write!(f, "navigation timed out"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TargetStateError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("target crashed: {0}")]
    Crashed(String),
    #[error("target detached: {0}")]
    Detached(String),
    #[error("page closed")]
    PageClosed,
}

impl From<crate::ws::frame::FrameError> for Error {
    fn from(e: crate::ws::frame::FrameError) -> Self {
        Error::Transport(TransportError::Protocol(e.to_string()))
    }
}
