use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SourceResult;
use crate::traits::{SourceStream, StreamSource};

/// Ordered fallback: the first source that yields a stream wins.
///
/// Sources that return nothing are skipped. Errors propagate and end the
/// resolution, so a leg that may fail should be wrapped in
/// [`Shielded`](crate::Shielded), and a chain that must not come back empty
/// can end with a [`Failing`](crate::Failing) terminator.
#[derive(Default)]
pub struct Composite {
    sources: Vec<Box<dyn StreamSource>>,
}

impl Composite {
    pub fn new(sources: Vec<Box<dyn StreamSource>>) -> Self {
        Self { sources }
    }

    /// Append a source to the end of the chain.
    pub fn with(mut self, source: impl StreamSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl StreamSource for Composite {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        for source in &self.sources {
            if let Some(stream) = source.open()? {
                debug!(source = %source.describe(), "composite resolved");
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    fn supports_timestamp(&self) -> bool {
        self.sources.iter().any(|s| s.supports_timestamp())
    }

    /// The first timestamp reported along the chain.
    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        for source in self.sources.iter().filter(|s| s.supports_timestamp()) {
            if let Some(timestamp) = source.timestamp()? {
                return Ok(Some(timestamp));
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("composite[{}]", parts.join(", "))
    }
}
