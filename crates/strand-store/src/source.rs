//! Stored versions as stream sources.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strand_source::{SourceError, SourceResult, SourceStream, StreamSource};
use strand_types::StorageEntry;

use crate::error::StoreResult;
use crate::traits::StreamStore;

/// One fixed version of a stream, served from the store that holds it.
///
/// Its timestamp is the version's `valid_since`, so it competes in a
/// [`MostRecent`](strand_source::MostRecent) against local copies on equal
/// terms.
pub struct EntrySource<S: StreamStore + ?Sized> {
    store: Arc<S>,
    entry: StorageEntry,
}

impl<S: StreamStore + ?Sized> EntrySource<S> {
    pub fn new(store: Arc<S>, entry: StorageEntry) -> Self {
        Self { store, entry }
    }

    /// The version of `name` valid at `as_of`, `None` if there is none.
    pub fn find(store: Arc<S>, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<Self>> {
        Ok(store.find(name, as_of)?.map(|entry| Self::new(store, entry)))
    }

    pub fn entry(&self) -> &StorageEntry {
        &self.entry
    }
}

impl<S: StreamStore + ?Sized> StreamSource for EntrySource<S> {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        Ok(Some(self.store.open_entry(&self.entry)?))
    }

    fn supports_timestamp(&self) -> bool {
        true
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(Some(self.entry.valid_since()))
    }

    fn describe(&self) -> String {
        format!("store:{}", self.entry)
    }
}

/// Whatever version of `name` is open when the source is opened.
///
/// Unlike [`EntrySource`] this follows new commits; nothing stored yet
/// means nothing to serve.
pub struct LatestSource<S: StreamStore + ?Sized> {
    store: Arc<S>,
    name: String,
}

impl<S: StreamStore + ?Sized> LatestSource<S> {
    pub fn new(store: Arc<S>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    fn current(&self) -> SourceResult<Option<StorageEntry>> {
        self.store.find_open(&self.name).map_err(SourceError::from)
    }
}

impl<S: StreamStore + ?Sized> StreamSource for LatestSource<S> {
    fn open(&self) -> SourceResult<Option<SourceStream>> {
        match self.current()? {
            Some(entry) => Ok(Some(self.store.open_entry(&entry)?)),
            None => Ok(None),
        }
    }

    fn supports_timestamp(&self) -> bool {
        true
    }

    fn timestamp(&self) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(self.current()?.map(|entry| entry.valid_since()))
    }

    fn describe(&self) -> String {
        format!("store:{}@latest", self.name)
    }
}
