use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::traits::{SourceStream, StreamSource};

type ErrorFn = Box<dyn Fn() -> SourceError + Send + Sync>;

/// Always fails on `open`.
///
/// Ends a [`Composite`](crate::Composite) with an explicit error instead of
/// letting an exhausted chain quietly return nothing.
pub struct Failing {
    label: String,
    error: ErrorFn,
}

impl Failing {
    pub fn new(label: impl Into<String>, error: impl Fn() -> SourceError + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            error: Box::new(error),
        }
    }

    /// Fail with [`SourceError::NotFound`] naming `what`.
    pub fn not_found(what: impl Into<String>) -> Self {
        let what = what.into();
        let message = what.clone();
        Self::new(what, move || SourceError::NotFound(message.clone()))
    }
}

impl StreamSource for Failing {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        debug!(label = %self.label, "failing terminator reached");
        Err((self.error)())
    }

    fn describe(&self) -> String {
        format!("failing:{}", self.label)
    }
}
