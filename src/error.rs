//! Error types for QuerySpeak.

use thiserror::Error;

/// The main error type for QuerySpeak operations.
///
/// The text passes (`fix`, `optimize`, `explain`) never produce one of
/// these; they are reserved for the collaborators around them.
#[derive(Debug, Error)]
pub enum QuerySpeakError {
    /// The database could not be opened at all.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was sent to the database and failed.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Reading table metadata failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The query generator failed or returned nothing usable.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuerySpeakError {
    /// True for failures that happened before any SQL reached the database.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type alias for QuerySpeak operations.
pub type QsResult<T> = Result<T, QuerySpeakError>;
