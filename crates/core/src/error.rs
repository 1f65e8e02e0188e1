// Central Error Type for queue operations

use thiserror::Error;

/// Queue client error type
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Queue already exists: {0}")]
    QueueExists(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Message {msg_id} not found in queue {queue}")]
    MessageNotFound { queue: String, msg_id: i64 },

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    /// Transport failures are the only errors a caller-side retry can fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Connection(_))
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;

// Note: sqlx::Error conversion is handled in the infra-postgres crate
// by mapping SQLSTATE codes onto the variants above
