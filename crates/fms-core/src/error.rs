use thiserror::Error;

/// Typed failures returned by the arena's entry operations.
///
/// Every operation either succeeds or returns one of these without mutating
/// any arena state. Link errors are the exception in that they are never
/// returned from an entry operation -- they are logged per station during the
/// control loop and surface only through the robot status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// The operation is not legal in the current match phase.
    #[error("{0}")]
    State(String),
    /// Malformed input, such as an unknown station key.
    #[error("{0}")]
    Validation(String),
    /// The storage collaborator has no record for the requested id.
    #[error("{0}")]
    NotFound(String),
    /// I/O failure on a single controller link.
    #[error("link error: {0}")]
    Link(String),
    /// Invalid timing configuration.
    #[error("invalid match timing: {0}")]
    Config(String),
    /// Failure reported by the storage collaborator.
    #[error("storage error: {0}")]
    Store(String),
}

impl ArenaError {
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
