use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::SourceResult;
use crate::traits::{SourceStream, StreamSource};

/// Logs what the wrapped source did without changing it.
///
/// Records whether a stream was obtained and which source produced it;
/// failures are logged and returned unchanged.
pub struct Traced {
    inner: Box<dyn StreamSource>,
}

impl Traced {
    pub fn new(source: impl StreamSource + 'static) -> Self {
        Self {
            inner: Box::new(source),
        }
    }
}

impl StreamSource for Traced {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        let source = self.inner.describe();
        match self.inner.open() {
            Ok(Some(stream)) => {
                debug!(%source, "stream obtained");
                Ok(Some(stream))
            }
            Ok(None) => {
                debug!(%source, "no stream");
                Ok(None)
            }
            Err(error) => {
                warn!(%source, %error, "open failed");
                Err(error)
            }
        }
    }

    fn supports_timestamp(&self) -> bool {
        self.inner.supports_timestamp()
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        let result = self.inner.timestamp();
        match &result {
            Ok(timestamp) => debug!(source = %self.inner.describe(), ?timestamp, "timestamp"),
            Err(error) => warn!(source = %self.inner.describe(), %error, "timestamp failed"),
        }
        result
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
