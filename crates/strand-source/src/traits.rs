use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::SourceResult;

/// A readable stream handed out by a source. The caller owns it and
/// releases it by dropping it.
pub type SourceStream = Box<dyn Read + Send>;

/// Something that can produce a byte stream on demand.
///
/// `open` returning `Ok(None)` means "nothing here", which is not an error:
/// fallbacks move on to the next source. Timestamp support is optional and
/// advertised through [`supports_timestamp`](StreamSource::supports_timestamp).
pub trait StreamSource: Send + Sync {
    /// Produce a fresh stream, or `None` if this source has nothing to serve.
    fn open(&self) -> SourceResult<Option<SourceStream>>;

    /// Whether [`timestamp`](StreamSource::timestamp) is meaningful.
    fn supports_timestamp(&self) -> bool {
        false
    }

    /// Last-modified instant of the content `open` would return.
    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(None)
    }

    /// Human-readable identity, used in logs.
    fn describe(&self) -> String;
}

/// A destination that can be refreshed with newer content.
pub trait StreamSink: Send + Sync {
    /// Last-modified instant of the current content, `None` if there is none.
    fn modified_at(&self) -> SourceResult<Option<DateTime<Utc>>>;

    /// Replace the content with `content` and stamp it with `timestamp`.
    /// Returns the number of bytes written.
    fn replace_with(&self, content: &mut dyn Read, timestamp: DateTime<Utc>) -> SourceResult<u64>;

    fn location(&self) -> String;
}

impl<S: StreamSource + ?Sized> StreamSource for Box<S> {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        (**self).open()
    }

    fn supports_timestamp(&self) -> bool {
        (**self).supports_timestamp()
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        (**self).timestamp()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: StreamSource + ?Sized> StreamSource for Arc<S> {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        (**self).open()
    }

    fn supports_timestamp(&self) -> bool {
        (**self).supports_timestamp()
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        (**self).timestamp()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
