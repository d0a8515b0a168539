use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::SourceResult;
use crate::file::LocalFile;
use crate::traits::{SourceStream, StreamSink, StreamSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MirrorMode {
    /// Refresh, then serve the local copy.
    Serve,
    /// Refresh only; never serve.
    MirrorOnly,
}

/// Keeps a local file in sync with a timestamped remote source.
///
/// On `open`, the remote's timestamp is compared with the local file's
/// last-write time. Only when the remote is strictly newer (or the local
/// file is missing) are its bytes pulled into the local file, which is then
/// stamped with the remote timestamp. The caller always reads the local
/// copy. The [`mirror_only`](CachingSource::mirror_only) variant performs
/// the refresh as a side effect and serves nothing, so it can warm a cache
/// at the head of a [`Composite`](crate::Composite).
pub struct CachingSource {
    remote: Box<dyn StreamSource>,
    local: LocalFile,
    mode: MirrorMode,
}

impl CachingSource {
    pub fn new(remote: impl StreamSource + 'static, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: Box::new(remote),
            local: LocalFile::new(local),
            mode: MirrorMode::Serve,
        }
    }

    pub fn mirror_only(remote: impl StreamSource + 'static, local: impl Into<PathBuf>) -> Self {
        Self {
            mode: MirrorMode::MirrorOnly,
            ..Self::new(remote, local)
        }
    }

    pub fn local(&self) -> &LocalFile {
        &self.local
    }

    /// Pull the remote into the local file if the remote is newer.
    ///
    /// Returns `true` when the local file was rewritten.
    pub fn refresh(&self) -> SourceResult<bool> {
        let Some(remote_ts) = self.remote.timestamp()? else {
            debug!(remote = %self.remote.describe(), "remote reports no timestamp; keeping local copy");
            return Ok(false);
        };
        let local_ts = self.local.modified()?;
        if local_ts.is_some_and(|local_ts| remote_ts <= local_ts) {
            return Ok(false);
        }

        let Some(mut stream) = self.remote.open()? else {
            return Ok(false);
        };
        let bytes = self.local.replace_with(&mut stream, remote_ts)?;
        info!(
            remote = %self.remote.describe(),
            local = %self.local.location(),
            bytes,
            %remote_ts,
            "mirrored newer remote content"
        );
        Ok(true)
    }
}

impl StreamSource for CachingSource {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        self.refresh()?;
        match self.mode {
            MirrorMode::Serve => self.local.open(),
            MirrorMode::MirrorOnly => Ok(None),
        }
    }

    fn supports_timestamp(&self) -> bool {
        self.mode == MirrorMode::Serve
    }

    /// The timestamp the local copy will carry once refreshed.
    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        if self.mode == MirrorMode::MirrorOnly {
            return Ok(None);
        }
        let remote = self.remote.timestamp()?;
        let local = self.local.modified()?;
        Ok(remote.max(local))
    }

    fn describe(&self) -> String {
        match self.mode {
            MirrorMode::Serve => format!("caching[{} -> {}]", self.remote.describe(), self.local.location()),
            MirrorMode::MirrorOnly => format!("mirror[{} -> {}]", self.remote.describe(), self.local.location()),
        }
    }
}
