use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::EntryError;

/// Metadata for a version that has not been committed yet.
///
/// Carries everything a backend needs to append the version. It has no
/// `valid_until` and cannot be closed; committing turns it into a
/// [`StorageEntry`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub name: String,
    pub length: u64,
    pub hash: ContentDigest,
    pub valid_since: DateTime<Utc>,
}

impl PendingEntry {
    pub fn new(
        name: impl Into<String>,
        length: u64,
        hash: ContentDigest,
        valid_since: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            length,
            hash,
            valid_since,
        }
    }

    /// The committed, open entry for this version.
    pub fn into_entry(self) -> StorageEntry {
        StorageEntry {
            name: self.name,
            length: self.length,
            hash: self.hash,
            valid_since: self.valid_since,
            valid_until: None,
        }
    }
}

/// One committed version of one named stream.
///
/// Valid over `[valid_since, valid_until)`. An entry with no `valid_until`
/// is the open (live) version for its name. `valid_until` is set at most
/// once, by the owning backend, when a newer version commits.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    name: String,
    length: u64,
    hash: ContentDigest,
    valid_since: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
}

impl StorageEntry {
    /// Rebuild an entry read back from persistent storage.
    pub fn restore(
        name: impl Into<String>,
        length: u64,
        hash: ContentDigest,
        valid_since: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        if let Some(until) = valid_until {
            if until < valid_since {
                return Err(EntryError::InvalidInterval {
                    name,
                    since: valid_since,
                    until,
                });
            }
        }
        Ok(Self {
            name,
            length,
            hash,
            valid_since,
            valid_until,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte length of this version's content.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn hash(&self) -> &ContentDigest {
        &self.hash
    }

    pub fn valid_since(&self) -> DateTime<Utc> {
        self.valid_since
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// `true` while this is the live version for its name.
    pub fn is_open(&self) -> bool {
        self.valid_until.is_none()
    }

    /// Whether `instant` falls inside `[valid_since, valid_until)`.
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.valid_since <= instant && self.valid_until.map_or(true, |until| instant < until)
    }

    /// Mark this version as superseded at `until`.
    ///
    /// Only backends call this, when the next version for the same name
    /// commits.
    pub fn close(&mut self, until: DateTime<Utc>) -> Result<(), EntryError> {
        if let Some(existing) = self.valid_until {
            return Err(EntryError::AlreadyClosed {
                name: self.name.clone(),
                since: self.valid_since,
                until: existing,
            });
        }
        if until < self.valid_since {
            return Err(EntryError::InvalidInterval {
                name: self.name.clone(),
                since: self.valid_since,
                until,
            });
        }
        self.valid_until = Some(until);
        Ok(())
    }

    /// Whether `other` describes the same version (name, start and content).
    ///
    /// Ignores `valid_until`, so a snapshot taken while the version was open
    /// still matches after it was closed.
    pub fn same_version(&self, other: &StorageEntry) -> bool {
        self.name == other.name && self.valid_since == other.valid_since && self.hash == other.hash
    }
}

impl fmt::Debug for StorageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEntry")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("hash", &self.hash)
            .field("valid_since", &self.valid_since)
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

impl fmt::Display for StorageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.valid_until {
            Some(until) => write!(
                f,
                "{}@{} [{} .. {}) {}B",
                self.name,
                self.hash.short_hex(),
                self.valid_since.to_rfc3339(),
                until.to_rfc3339(),
                self.length
            ),
            None => write!(
                f,
                "{}@{} [{} .. open) {}B",
                self.name,
                self.hash.short_hex(),
                self.valid_since.to_rfc3339(),
                self.length
            ),
        }
    }
}
