use std::io::{self, Read};

use chrono::{DateTime, Utc};
use strand_crypto::{read_hashed, ReadError};
use strand_source::{SourceStream, StreamSink, StreamSource};
use strand_types::{temporal, PendingEntry, StorageEntry};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Versioned, content-addressed store of named byte streams.
///
/// Backends provide the lookups and a guarded [`commit`](StreamStore::commit);
/// the versioning rules (dedup, timestamp assignment, sync with sources and
/// sinks) live in the provided methods and are shared by every backend.
///
/// All implementations must satisfy these invariants:
/// - Per name, entries are ordered by `valid_since` and never overlap.
/// - At most one entry per name is open (`valid_until` unset).
/// - A committed entry's `name`, `length`, `hash` and content never change;
///   only its `valid_until` is set, once.
/// - `commit` is all-or-nothing: on error the store is unchanged.
pub trait StreamStore: Send + Sync {
    fn config(&self) -> &StoreConfig;

    /// The entry for `name` valid at `as_of`, if any.
    fn find(&self, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<StorageEntry>>;

    /// Every entry ever stored under `name`, newest first.
    fn history(&self, name: &str) -> StoreResult<Vec<StorageEntry>>;

    /// The entry valid at `as_of` for every name that has one, ordered by name.
    fn inventory(&self, as_of: DateTime<Utc>) -> StoreResult<Vec<StorageEntry>>;

    /// Open the stored content of a committed entry.
    ///
    /// Returns [`StoreError::EntryNotFound`] if the backend no longer holds
    /// that version.
    fn open_entry(&self, entry: &StorageEntry) -> StoreResult<SourceStream>;

    /// Append `pending` as the new open version of its name.
    ///
    /// `previous` is the open entry the caller observed (`None` if it saw
    /// none). The backend must verify that it is still the open entry,
    /// close it at `pending.valid_since` and append the new entry in one
    /// atomic step. If the open entry changed in the meantime nothing is
    /// written and [`StoreError::ConcurrencyConflict`] is returned.
    fn commit(
        &self,
        previous: Option<&StorageEntry>,
        pending: PendingEntry,
        content: Vec<u8>,
    ) -> StoreResult<StorageEntry>;

    /// The open entry for `name`: the one that stays valid into the future.
    fn find_open(&self, name: &str) -> StoreResult<Option<StorageEntry>> {
        self.find(name, temporal::far_future())
    }

    /// The entry for `name` valid right now.
    fn find_current(&self, name: &str) -> StoreResult<Option<StorageEntry>> {
        self.find(name, temporal::now())
    }

    /// Open the content of `name` as of `as_of`, `None` if nothing was valid.
    fn open(&self, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<SourceStream>> {
        match self.find(name, as_of)? {
            Some(entry) => self.open_entry(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Read the whole content of `name` as of `as_of` into memory.
    fn load(&self, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<Vec<u8>>> {
        let Some(entry) = self.find(name, as_of)? else {
            return Ok(None);
        };
        let mut stream = self.open_entry(&entry)?;
        let mut bytes = Vec::with_capacity(entry.length() as usize);
        stream.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    /// Store `content` as the newest version of `name`.
    ///
    /// Returns `false` without writing anything if the content hashes the
    /// same as the open version, `true` if a new version was committed.
    fn store(&self, name: &str, content: &mut dyn Read) -> StoreResult<bool> {
        self.store_sized(name, content, None)
    }

    /// Like [`store`](StreamStore::store), with the expected content length
    /// as a buffer-sizing hint.
    fn store_sized(
        &self,
        name: &str,
        content: &mut dyn Read,
        length_hint: Option<u64>,
    ) -> StoreResult<bool> {
        validate_name(name)?;
        let config = self.config();
        let content = read_hashed(content, config.digest, length_hint, config.max_content_bytes)
            .map_err(|e| match e {
                ReadError::Io(e) => StoreError::Io(e),
                ReadError::TooLarge { limit } => StoreError::ContentTooLarge {
                    name: name.to_string(),
                    limit,
                },
            })?;

        let previous = self.find_open(name)?;
        if let Some(open) = &previous {
            if open.hash() == &content.digest {
                debug!(name, hash = %open.hash().short_hex(), "content unchanged, skipping store");
                return Ok(false);
            }
        }

        let valid_since = temporal::next_valid_since(
            previous.as_ref().map(StorageEntry::valid_since),
            temporal::now(),
        );
        let pending = PendingEntry::new(name, content.len(), content.digest, valid_since);
        let entry = self.commit(previous.as_ref(), pending, content.bytes)?;
        info!(
            name,
            hash = %entry.hash().short_hex(),
            length = entry.length(),
            valid_since = %entry.valid_since(),
            "stored new version"
        );
        Ok(true)
    }

    /// Store whatever `source` currently serves under `name`.
    ///
    /// A source with nothing to serve stores nothing and returns `false`.
    fn upload(&self, name: &str, source: &dyn StreamSource) -> StoreResult<bool> {
        let Some(mut stream) = source.open()? else {
            warn!(name, source = %source.describe(), "source produced no stream, nothing uploaded");
            return Ok(false);
        };
        self.store(name, &mut stream)
    }

    /// Refresh `destination` from the version of `name` valid at `as_of`.
    ///
    /// Copies only when that version is strictly newer than the destination,
    /// stamping the destination with the version's `valid_since`, and then
    /// returns whether the destination is now at least as new as that
    /// version. Returns `false` without touching the destination when there
    /// is no version or nothing newer to copy.
    fn download(
        &self,
        name: &str,
        as_of: DateTime<Utc>,
        destination: &dyn StreamSink,
    ) -> StoreResult<bool> {
        let Some(entry) = self.find(name, as_of)? else {
            debug!(name, %as_of, "nothing to download");
            return Ok(false);
        };
        let since = entry.valid_since();
        if let Some(modified) = destination.modified_at()? {
            if since <= modified {
                debug!(name, destination = %destination.location(), "destination already up to date");
                return Ok(false);
            }
        }

        let mut stream = self.open_entry(&entry)?;
        let written = destination.replace_with(&mut stream, since)?;
        if written != entry.length() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "copied {written} of {} bytes of {name} to {}",
                    entry.length(),
                    destination.location()
                ),
            )));
        }
        info!(name, destination = %destination.location(), bytes = written, "downloaded version");
        Ok(destination.modified_at()?.is_some_and(|ts| ts >= since))
    }
}

/// Stream names are opaque keys but must be non-empty and free of control
/// characters so they survive round-trips through files and logs.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.chars().any(char::is_control) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::Duration;
    use strand_source::{BytesSource, Failing, LocalFile};

    use super::*;
    use crate::memory::InMemoryStreamStore;

    fn put(store: &dyn StreamStore, name: &str, bytes: &[u8]) -> bool {
        store.store(name, &mut Cursor::new(bytes.to_vec())).unwrap()
    }

    // -----------------------------------------------------------------------
    // store / load
    // -----------------------------------------------------------------------

    #[test]
    fn store_then_load_round_trip() {
        let store = InMemoryStreamStore::new();
        assert!(put(&store, "a.txt", b"hello"));
        let loaded = store.load("a.txt", temporal::now()).unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn identical_content_is_deduplicated() {
        let store = InMemoryStreamStore::new();
        assert!(put(&store, "x", b"same"));
        assert!(!put(&store, "x", b"same"));
        assert_eq!(store.history("x").unwrap().len(), 1);

        assert!(put(&store, "x", b"different"));
        assert!(put(&store, "x", b"same"));
        assert_eq!(store.history("x").unwrap().len(), 3);
    }

    #[test]
    fn successive_versions_are_strictly_ordered() {
        let store = InMemoryStreamStore::new();
        for i in 0..20 {
            put(&store, "tight", format!("v{i}").as_bytes());
        }
        let mut history = store.history("tight").unwrap();
        assert_eq!(history.len(), 20);
        history.reverse();
        temporal::verify_timeline(&history).unwrap();
        assert!(history.last().unwrap().is_open());
    }

    #[test]
    fn empty_content_is_a_version() {
        let store = InMemoryStreamStore::new();
        assert!(put(&store, "empty", b""));
        let entry = store.find_current("empty").unwrap().unwrap();
        assert_eq!(entry.length(), 0);
        assert_eq!(store.load("empty", temporal::now()).unwrap(), Some(vec![]));
    }

    #[test]
    fn load_unknown_name_is_none() {
        let store = InMemoryStreamStore::new();
        assert!(store.load("missing", temporal::now()).unwrap().is_none());
        assert!(store.open("missing", temporal::now()).unwrap().is_none());
    }

    #[test]
    fn load_before_first_version_is_none() {
        let store = InMemoryStreamStore::new();
        let before = temporal::now() - Duration::seconds(1);
        put(&store, "late", b"data");
        assert!(store.load("late", before).unwrap().is_none());
    }

    #[test]
    fn invalid_names_rejected() {
        let store = InMemoryStreamStore::new();
        let err = store.store("", &mut Cursor::new(b"x".to_vec())).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        let err = store.store("a\nb", &mut Cursor::new(b"x".to_vec())).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[test]
    fn oversized_content_rejected() {
        let config = StoreConfig {
            max_content_bytes: Some(4),
            ..Default::default()
        };
        let store = InMemoryStreamStore::with_config(config);
        let err = store.store("big", &mut Cursor::new(b"12345".to_vec())).unwrap_err();
        assert!(matches!(err, StoreError::ContentTooLarge { limit: 4, .. }));
        assert!(store.history("big").unwrap().is_empty());
    }

    #[test]
    fn earlier_versions_stay_readable() {
        let store = InMemoryStreamStore::new();
        put(&store, "doc", b"one");
        let first = store.find_current("doc").unwrap().unwrap();
        put(&store, "doc", b"two");

        let loaded = store.load("doc", first.valid_since()).unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"one"[..]));
        let loaded = store.load("doc", temporal::far_future()).unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"two"[..]));
    }

    // -----------------------------------------------------------------------
    // upload / download
    // -----------------------------------------------------------------------

    #[test]
    fn upload_from_source() {
        let store = InMemoryStreamStore::new();
        let source = BytesSource::new("payload", b"uploaded".to_vec());
        assert!(store.upload("u", &source).unwrap());
        assert!(!store.upload("u", &source).unwrap());
        assert_eq!(
            store.load("u", temporal::now()).unwrap().as_deref(),
            Some(&b"uploaded"[..])
        );
    }

    #[test]
    fn upload_from_empty_source_stores_nothing() {
        let store = InMemoryStreamStore::new();
        let dir = tempfile::tempdir().unwrap();
        let missing = LocalFile::new(dir.path().join("nope"));
        assert!(!store.upload("u", &missing).unwrap());
        assert!(store.history("u").unwrap().is_empty());
    }

    #[test]
    fn upload_propagates_source_errors() {
        let store = InMemoryStreamStore::new();
        let err = store.upload("u", &Failing::not_found("origin")).unwrap_err();
        assert!(matches!(err, StoreError::Source(_)));
    }

    #[test]
    fn download_into_fresh_file() {
        let store = InMemoryStreamStore::new();
        put(&store, "cfg", b"config v1");
        let entry = store.find_current("cfg").unwrap().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("cfg.txt"));
        assert!(store.download("cfg", temporal::now(), &file).unwrap());
        assert_eq!(std::fs::read(file.path()).unwrap(), b"config v1");
        assert_eq!(file.modified_at().unwrap(), Some(entry.valid_since()));
    }

    #[test]
    fn download_skips_up_to_date_destination() {
        let store = InMemoryStreamStore::new();
        put(&store, "cfg", b"from store");

        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("cfg.txt"));
        let newer = temporal::now() + Duration::hours(1);
        file.replace_with(&mut Cursor::new(b"local edit".to_vec()), newer)
            .unwrap();

        assert!(!store.download("cfg", temporal::now(), &file).unwrap());
        assert_eq!(std::fs::read(file.path()).unwrap(), b"local edit");
        assert_eq!(file.modified_at().unwrap(), Some(newer));
    }

    #[test]
    fn download_replaces_stale_destination() {
        let store = InMemoryStreamStore::new();
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("cfg.txt"));
        let older = temporal::now() - Duration::hours(1);
        file.replace_with(&mut Cursor::new(b"stale".to_vec()), older)
            .unwrap();

        put(&store, "cfg", b"fresh");
        assert!(store.download("cfg", temporal::now(), &file).unwrap());
        assert_eq!(std::fs::read(file.path()).unwrap(), b"fresh");
        assert!(!store.download("cfg", temporal::now(), &file).unwrap());
    }

    #[test]
    fn download_without_version_is_false() {
        let store = InMemoryStreamStore::new();
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("cfg.txt"));
        assert!(!store.download("cfg", temporal::now(), &file).unwrap());
        assert!(!file.exists());
    }
}
