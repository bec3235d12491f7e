use std::io;
use std::string::FromUtf8Error;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Invalid command shape: {0}")]
    InvalidCommandShape(String),

    #[error("Failed to spawn `{program}`: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Process output is not valid UTF-8: {0}")]
    OutputDecode(#[from] FromUtf8Error),

    #[error("IO error while collecting process output: {0}")]
    Io(#[from] io::Error),

    #[error("Command timed out after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),
}

impl ExecError {
    pub(crate) fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidCommandShape(message.into())
    }

    /// Whether the failure happened before any process existed.
    #[must_use]
    pub const fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailure { .. })
    }
}
