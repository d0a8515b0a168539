/// Errors raised while resolving or reading a stream source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Nothing to read. Raised by a failing terminator at the end of a chain.
    #[error("not found: {0}")]
    NotFound(String),

    /// The source exists but cannot serve right now (network down, origin refused).
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// A failure reported by a storage backend behind the source.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
