//! Error types for the SQLite backend

use strand_store::StoreError;
use strand_types::EntryError;
use thiserror::Error;

/// SQLite backend error type
#[derive(Error, Debug)]
pub enum SqlError {
    /// Database could not be opened or configured
    #[error("Connection error: {0}")]
    Connection(String),

    /// Table name is not a plain SQL identifier
    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),

    /// A stored row does not decode into a valid entry
    #[error("Corrupt row for {name}: {reason}")]
    CorruptRow { name: String, reason: String },

    /// The guarded close found no matching open row
    #[error("Concurrency conflict on {0}")]
    Conflict(String),

    #[error(transparent)]
    Entry(#[from] EntryError),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqlResult<T> = Result<T, SqlError>;

impl From<SqlError> for StoreError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::Conflict(name) => StoreError::ConcurrencyConflict { name },
            SqlError::Entry(e) => StoreError::InvalidEntry(e),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}
