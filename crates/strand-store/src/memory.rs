use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use strand_source::SourceStream;
use strand_types::{temporal, EntryError, PendingEntry, StorageEntry};
use tracing::warn;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::StreamStore;

/// One committed version and its bytes.
struct Version {
    entry: StorageEntry,
    content: Arc<[u8]>,
}

type Timelines = BTreeMap<String, Vec<Version>>;

/// In-memory stream store.
///
/// Intended for tests and embedding. Each name maps to its versions in
/// ascending `valid_since` order behind a `RwLock`; content is shared, so
/// opened streams never copy it.
pub struct InMemoryStreamStore {
    config: StoreConfig,
    streams: RwLock<Timelines>,
}

impl InMemoryStreamStore {
    /// Create a new empty store with default settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            streams: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of names with at least one version.
    pub fn len(&self) -> usize {
        self.read().map(|streams| streams.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of versions across all names.
    pub fn version_count(&self) -> usize {
        self.read()
            .map(|streams| streams.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Total bytes held across all versions.
    pub fn total_bytes(&self) -> u64 {
        self.read()
            .map(|streams| {
                streams
                    .values()
                    .flatten()
                    .map(|version| version.entry.length())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// All stored names, sorted.
    pub fn names(&self) -> StoreResult<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Drop every version of every name.
    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Timelines>> {
        self.streams.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Timelines>> {
        self.streams.write().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Index of the version valid at `as_of`.
fn version_at(versions: &[Version], as_of: DateTime<Utc>) -> Option<usize> {
    temporal::locate(versions, as_of, |v| v.entry.valid_since())
        .filter(|&i| versions[i].entry.is_valid_at(as_of))
}

impl Default for InMemoryStreamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamStore for InMemoryStreamStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn find(&self, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<StorageEntry>> {
        let streams = self.read()?;
        Ok(streams.get(name).and_then(|versions| {
            version_at(versions, as_of).map(|i| versions[i].entry.clone())
        }))
    }

    fn history(&self, name: &str) -> StoreResult<Vec<StorageEntry>> {
        let streams = self.read()?;
        Ok(streams
            .get(name)
            .map(|versions| versions.iter().rev().map(|v| v.entry.clone()).collect())
            .unwrap_or_default())
    }

    fn inventory(&self, as_of: DateTime<Utc>) -> StoreResult<Vec<StorageEntry>> {
        let streams = self.read()?;
        Ok(streams
            .values()
            .filter_map(|versions| {
                version_at(versions, as_of).map(|i| versions[i].entry.clone())
            })
            .collect())
    }

    fn open_entry(&self, entry: &StorageEntry) -> StoreResult<SourceStream> {
        let streams = self.read()?;
        let content = streams
            .get(entry.name())
            .and_then(|versions| {
                let i = temporal::locate(versions, entry.valid_since(), |v| v.entry.valid_since())?;
                let version = &versions[i];
                version.entry.same_version(entry).then(|| Arc::clone(&version.content))
            })
            .ok_or_else(|| StoreError::EntryNotFound {
                name: entry.name().to_string(),
                valid_since: entry.valid_since(),
            })?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn commit(
        &self,
        previous: Option<&StorageEntry>,
        pending: PendingEntry,
        content: Vec<u8>,
    ) -> StoreResult<StorageEntry> {
        let mut streams = self.write()?;
        let name = pending.name.clone();

        let last = streams.get(&name).and_then(|versions| versions.last());
        let open = last.map(|v| &v.entry).filter(|e| e.is_open());
        let guard_holds = match (previous, open) {
            (None, None) => true,
            (Some(seen), Some(current)) => seen.same_version(current),
            _ => false,
        };
        if !guard_holds {
            warn!(%name, "open version changed since it was read, rejecting commit");
            return Err(StoreError::ConcurrencyConflict { name });
        }
        if let Some(last) = last {
            if pending.valid_since <= last.entry.valid_since() {
                return Err(EntryError::Overlap {
                    name,
                    at: pending.valid_since,
                }
                .into());
            }
        }

        let versions = streams.entry(name).or_default();
        if let Some(current) = versions.last_mut().filter(|v| v.entry.is_open()) {
            current.entry.close(pending.valid_since)?;
        }
        let entry = pending.into_entry();
        versions.push(Version {
            entry: entry.clone(),
            content: Arc::from(content),
        });
        Ok(entry)
    }
}

impl std::fmt::Debug for InMemoryStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStreamStore")
            .field("names", &self.len())
            .field("versions", &self.version_count())
            .field("config", &self.config)
            .finish()
    }
}
