use thiserror::Error;

/// Main error type for ChurnGuard
#[derive(Error, Debug)]
pub enum ChurnError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Uniqueness constraint violated at the storage layer.
    /// Raised by repositories so callers dispatch on the variant instead of
    /// scanning error text.
    #[error("{0}")]
    Conflict(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Email delivery errors
    #[error("Email delivery error: {0}")]
    Email(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A blocking database task panicked or was cancelled
    #[error("Blocking task failed: {0}")]
    TaskJoin(String),
}

impl ChurnError {
    /// True when the error represents a uniqueness-constraint violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ChurnError::Conflict(_))
    }
}

/// Convenient Result type using ChurnError
pub type Result<T> = std::result::Result<T, ChurnError>;
