// Error taxonomy for the diesel control core
//
// InvalidInput is raised by validation before anything reaches the calculator.
// StoreError wraps whatever the record store reports and is propagated as-is.

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A quantity was negative or non-finite, or a required field was empty.
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Failure reported by the record store. Never retried.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Errors bubbled up from the record store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored timestamp '{0}' is not RFC 3339")]
    Timestamp(String),

    /// A thread panicked while holding the shared store handle
    #[error("store lock poisoned")]
    LockPoisoned,
}
