//! Local file collaborator: read, last-write time, atomic replace.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SourceResult;
use crate::traits::{SourceStream, StreamSink, StreamSource};

/// A file on the local file system, usable as both source and sink.
///
/// As a source it serves the file's bytes (nothing if the file is missing)
/// and reports the last-write time. As a sink it swaps in new content
/// atomically: the bytes land in a temporary sibling first, the displaced
/// file is kept as `<name>.bak`, then the temporary is renamed over the
/// target and stamped with the given modification time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the displaced previous content is kept after a replace.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Last-write time, `None` when the file does not exist.
    pub fn modified(&self) -> SourceResult<Option<DateTime<Utc>>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Keep the current file as the backup, replacing an older backup.
    fn preserve_current(&self) -> io::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let backup = self.backup_path();
        match fs::remove_file(&backup) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        // A hard link keeps the target in place until the final rename.
        if fs::hard_link(&self.path, &backup).is_err() {
            fs::copy(&self.path, &backup)?;
        }
        Ok(())
    }
}

impl StreamSource for LocalFile {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn supports_timestamp(&self) -> bool {
        true
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        self.modified()
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

impl StreamSink for LocalFile {
    fn modified_at(&self) -> SourceResult<Option<DateTime<Utc>>> {
        self.modified()
    }

    fn replace_with(&self, content: &mut dyn Read, timestamp: DateTime<Utc>) -> SourceResult<u64> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        let written = io::copy(content, &mut staged)?;
        staged.as_file().sync_all()?;

        self.preserve_current()?;
        let file = staged.persist(&self.path).map_err(|e| e.error)?;
        file.set_modified(SystemTime::from(timestamp))?;

        debug!(path = %self.path.display(), bytes = written, %timestamp, "replaced local file");
        Ok(written)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
