use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{SourceError, SourceResult};
use crate::traits::{SourceStream, StreamSource};

type Factory = Box<dyn Fn() -> SourceResult<Box<dyn StreamSource>> + Send + Sync>;

enum Guarded {
    Source(Box<dyn StreamSource>),
    /// Built on first use; a failed build is retried on the next call.
    Lazy {
        label: String,
        make: Factory,
        built: Mutex<Option<Arc<dyn StreamSource>>>,
    },
}

/// Contains failures of the wrapped source.
///
/// Every operation runs inside a guard: an error is recorded as the last
/// error and a default (`None` / `false`) is returned instead. One flaky
/// leg therefore cannot abort the resolution of a whole chain.
pub struct Shielded {
    inner: Guarded,
    last_error: Mutex<Option<Arc<SourceError>>>,
}

impl Shielded {
    pub fn new(source: impl StreamSource + 'static) -> Self {
        Self {
            inner: Guarded::Source(Box::new(source)),
            last_error: Mutex::new(None),
        }
    }

    /// Shield a source whose construction may itself fail.
    pub fn lazy(
        label: impl Into<String>,
        make: impl Fn() -> SourceResult<Box<dyn StreamSource>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Guarded::Lazy {
                label: label.into(),
                make: Box::new(make),
                built: Mutex::new(None),
            },
            last_error: Mutex::new(None),
        }
    }

    /// The most recent failure contained by this shield.
    pub fn last_error(&self) -> Option<Arc<SourceError>> {
        self.last_error.lock().clone()
    }

    pub fn has_failed(&self) -> bool {
        self.last_error.lock().is_some()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    fn with_source<T>(&self, op: impl FnOnce(&dyn StreamSource) -> SourceResult<T>) -> SourceResult<T> {
        match &self.inner {
            Guarded::Source(source) => op(source.as_ref()),
            Guarded::Lazy { make, built, .. } => {
                let source = {
                    let mut built = built.lock();
                    match built.as_ref() {
                        Some(source) => Arc::clone(source),
                        None => {
                            let source: Arc<dyn StreamSource> = Arc::from(make()?);
                            *built = Some(Arc::clone(&source));
                            source
                        }
                    }
                };
                op(source.as_ref())
            }
        }
    }

    fn guard<T>(&self, operation: &str, default: T, op: impl FnOnce(&dyn StreamSource) -> SourceResult<T>) -> T {
        match self.with_source(op) {
            Ok(value) => value,
            Err(error) => {
                warn!(source = %self.describe(), operation, %error, "shielded source failed");
                *self.last_error.lock() = Some(Arc::new(error));
                default
            }
        }
    }
}

impl StreamSource for Shielded {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        Ok(self.guard("open", None, |source| source.open()))
    }

    fn supports_timestamp(&self) -> bool {
        self.guard("supports_timestamp", false, |source| Ok(source.supports_timestamp()))
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(self.guard("timestamp", None, |source| source.timestamp()))
    }

    fn describe(&self) -> String {
        match &self.inner {
            Guarded::Source(source) => format!("shielded[{}]", source.describe()),
            Guarded::Lazy { label, .. } => format!("shielded[lazy:{label}]"),
        }
    }
}

impl fmt::Debug for Shielded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shielded")
            .field("source", &self.describe())
            .field("last_error", &self.last_error())
            .finish()
    }
}
