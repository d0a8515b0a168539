use chrono::{DateTime, Utc};
use strand_source::SourceError;
use strand_types::EntryError;

/// Errors from stream store operations.
///
/// "Nothing stored under that name/time" is not an error: lookups return
/// `Ok(None)` or an empty history instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer closed the open entry first. Nothing was written; the
    /// caller should re-read the open entry and decide whether to retry.
    #[error("concurrency conflict on {name}: the open version changed before commit")]
    ConcurrencyConflict { name: String },

    /// The content of a known entry is no longer held by the backend.
    #[error("content for {name}@{valid_since} not found")]
    EntryNotFound {
        name: String,
        valid_since: DateTime<Utc>,
    },

    #[error("invalid stream name: {0:?}")]
    InvalidName(String),

    #[error("content for {name} exceeds the {limit} byte limit")]
    ContentTooLarge { name: String, limit: u64 },

    #[error(transparent)]
    InvalidEntry(#[from] EntryError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside a storage backend (SQL driver, corrupt row, ...).
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for SourceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => SourceError::Io(e),
            StoreError::Source(e) => e,
            StoreError::EntryNotFound { name, valid_since } => {
                SourceError::NotFound(format!("{name}@{}", valid_since.to_rfc3339()))
            }
            other => SourceError::Backend(other.to_string()),
        }
    }
}
