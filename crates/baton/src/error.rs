//! Error types for baton.

use std::time::Duration;

/// Result type alias for baton operations.
pub type Result<T> = std::result::Result<T, BatonError>;

/// Main error type for baton.
#[derive(Debug, thiserror::Error)]
pub enum BatonError {
    /// A blocked wait or delay was aborted through a cancel token
    #[error("Operation cancelled")]
    Cancelled,

    /// A buffer cannot be built with zero slots
    #[error("Invalid capacity {0}: a buffer needs at least one slot")]
    InvalidCapacity(usize),

    /// A bounded wait reached its deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A task thread panicked before it could report
    #[error("Task '{0}' panicked")]
    TaskPanicked(String),
}

impl BatonError {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new task-panicked error
    pub fn task_panicked(task: impl Into<String>) -> Self {
        Self::TaskPanicked(task.into())
    }

    /// Whether this error is the cancellation signal rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
