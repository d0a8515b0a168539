use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced by entry and temporal operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// A close instant earlier than the version's `valid_since`.
    #[error("invalid interval for {name}: valid_until {until} is before valid_since {since}")]
    InvalidInterval {
        name: String,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    /// `valid_until` is write-once.
    #[error("entry {name}@{since} is already closed at {until}")]
    AlreadyClosed {
        name: String,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    /// Two versions of one name overlap, or an open version is not last.
    #[error("timeline for {name} overlaps at {at}")]
    Overlap { name: String, at: DateTime<Utc> },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
