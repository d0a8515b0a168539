//! In-process leaf sources.

use std::fmt;
use std::io::Cursor;

use chrono::{DateTime, Utc};

use crate::error::SourceResult;
use crate::traits::{SourceStream, StreamSource};

/// A fixed byte buffer, optionally stamped with a last-modified instant.
#[derive(Clone, Debug)]
pub struct BytesSource {
    label: String,
    bytes: Vec<u8>,
    timestamp: Option<DateTime<Utc>>,
}

impl BytesSource {
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl StreamSource for BytesSource {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        Ok(Some(Box::new(Cursor::new(self.bytes.clone()))))
    }

    fn supports_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(self.timestamp)
    }

    fn describe(&self) -> String {
        format!("bytes:{}", self.label)
    }
}

type OpenFn = Box<dyn Fn() -> SourceResult<Option<SourceStream>> + Send + Sync>;
type TimestampFn = Box<dyn Fn() -> SourceResult<Option<DateTime<Utc>>> + Send + Sync>;

/// A source backed by closures, e.g. a fetch from a remote origin.
pub struct FnSource {
    label: String,
    open: OpenFn,
    timestamp: Option<TimestampFn>,
}

impl FnSource {
    pub fn new(
        label: impl Into<String>,
        open: impl Fn() -> SourceResult<Option<SourceStream>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            open: Box::new(open),
            timestamp: None,
        }
    }

    pub fn with_timestamp(
        mut self,
        timestamp: impl Fn() -> SourceResult<Option<DateTime<Utc>>> + Send + Sync + 'static,
    ) -> Self {
        self.timestamp = Some(Box::new(timestamp));
        self
    }
}

impl StreamSource for FnSource {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        (self.open)()
    }

    fn supports_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        match &self.timestamp {
            Some(timestamp) => timestamp(),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("fn:{}", self.label)
    }
}

impl fmt::Debug for FnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("label", &self.label)
            .field("timestamped", &self.timestamp.is_some())
            .finish()
    }
}
