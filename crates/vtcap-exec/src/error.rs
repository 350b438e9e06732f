//! Error types for execution.

use thiserror::Error;

/// Errors that can occur while executing a command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The PTY or child process could not be started.
    #[error("spawn error: {0}")]
    Spawn(String),

    /// Local terminal mode could not be changed.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for execution operations.
pub type Result<T> = std::result::Result<T, ExecError>;
