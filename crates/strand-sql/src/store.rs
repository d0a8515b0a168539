//! SQLite-backed [`StreamStore`]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use strand_source::SourceStream;
use strand_store::{StoreConfig, StoreError, StoreResult, StreamStore};
use strand_types::{ContentDigest, EntryError, PendingEntry, StorageEntry};
use tracing::{debug, info, warn};

use crate::config::SqlConfig;
use crate::error::{SqlError, SqlResult};
use crate::schema::{self, Queries};

/// Stream store keeping every version as one row of a single table.
///
/// Content lives in the `RawStorage` column next to its metadata. The
/// connection is shared behind a mutex; independent processes (or several
/// stores opened on the same file) coordinate through SQLite's own locking
/// and the guarded close in [`commit`](StreamStore::commit).
#[derive(Clone)]
pub struct SqliteStreamStore {
    conn: Arc<Mutex<Connection>>,
    store: StoreConfig,
    sql: SqlConfig,
    queries: Arc<Queries>,
}

/// Row counts for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub names: u64,
    pub versions: u64,
    pub content_bytes: u64,
}

/// Entry columns as read, before validation
struct RawEntry {
    name: String,
    length: i64,
    valid_since: i64,
    valid_until: Option<i64>,
    hash: Vec<u8>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            length: row.get(1)?,
            valid_since: row.get(2)?,
            valid_until: row.get(3)?,
            hash: row.get(4)?,
        })
    }

    fn into_entry(self) -> SqlResult<StorageEntry> {
        let corrupt = |reason: String| SqlError::CorruptRow {
            name: self.name.clone(),
            reason,
        };
        let length = u64::try_from(self.length)
            .map_err(|_| corrupt(format!("negative length {}", self.length)))?;
        let valid_since = from_micros(self.valid_since).ok_or_else(|| {
            corrupt(format!("ValidSince {} out of range", self.valid_since))
        })?;
        let valid_until = match self.valid_until {
            Some(micros) => Some(
                from_micros(micros)
                    .ok_or_else(|| corrupt(format!("ValidUntil {micros} out of range")))?,
            ),
            None => None,
        };
        Ok(StorageEntry::restore(
            self.name,
            length,
            ContentDigest::new(self.hash),
            valid_since,
            valid_until,
        )?)
    }
}

fn to_micros(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

fn overlap(pending: &PendingEntry) -> SqlError {
    SqlError::Entry(EntryError::Overlap {
        name: pending.name.clone(),
        at: pending.valid_since,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

impl SqliteStreamStore {
    /// Open (creating if needed) the database and table described by `sql`.
    pub fn open(sql: SqlConfig, store: StoreConfig) -> SqlResult<Self> {
        sql.validate()?;
        info!(path = %sql.path.display(), table = %sql.table, "opening SQLite stream store");

        let conn = if sql.is_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = sql.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqlError::Connection(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
            Connection::open(&sql.path)?
        };
        Self::configure(&conn, &sql)?;
        schema::ensure_table(&conn, &sql.table)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            queries: Arc::new(Queries::for_table(&sql.table)),
            store,
            sql,
        })
    }

    /// A private in-memory database, for tests
    pub fn memory() -> SqlResult<Self> {
        Self::open(SqlConfig::memory(), StoreConfig::default())
    }

    pub fn sql_config(&self) -> &SqlConfig {
        &self.sql
    }

    fn configure(conn: &Connection, sql: &SqlConfig) -> SqlResult<()> {
        debug!("configuring SQLite pragmas");
        conn.busy_timeout(Duration::from_millis(sql.busy_timeout_ms))?;
        if sql.wal_mode && !sql.is_memory() {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(%mode, "journal mode set");
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        Ok(())
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> SqlResult<Vec<StorageEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let raw = stmt
            .query_map(params, RawEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawEntry::into_entry).collect()
    }

    /// Row counts for this store's table
    pub fn stats(&self) -> StoreResult<TableStats> {
        let conn = self.conn.lock();
        let (names, versions, bytes): (i64, i64, i64) = conn
            .query_row(&self.queries.stats, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(SqlError::from)?;
        Ok(TableStats {
            names: names.max(0) as u64,
            versions: versions.max(0) as u64,
            content_bytes: bytes.max(0) as u64,
        })
    }

    fn commit_rows(
        &self,
        previous: Option<&StorageEntry>,
        pending: &PendingEntry,
        content: &[u8],
    ) -> SqlResult<()> {
        let name = pending.name.as_str();
        let since = to_micros(pending.valid_since);
        let length = i64::try_from(pending.length).map_err(|_| SqlError::CorruptRow {
            name: name.to_string(),
            reason: format!("length {} exceeds SQLite range", pending.length),
        })?;

        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front so the guard and the insert
        // see the same snapshot.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match previous {
            Some(previous) => {
                if pending.valid_since <= previous.valid_since() {
                    return Err(overlap(pending));
                }
                let closed = tx.execute(
                    &self.queries.close,
                    params![
                        since,
                        name,
                        to_micros(previous.valid_since()),
                        previous.hash().as_bytes()
                    ],
                )?;
                if closed == 0 {
                    return Err(SqlError::Conflict(name.to_string()));
                }
            }
            None => {
                let open: bool = tx.query_row(&self.queries.has_open, [name], |row| row.get(0))?;
                if open {
                    return Err(SqlError::Conflict(name.to_string()));
                }
                let latest: Option<i64> =
                    tx.query_row(&self.queries.latest_since, [name], |row| row.get(0))?;
                if latest.is_some_and(|latest| since <= latest) {
                    return Err(overlap(pending));
                }
            }
        }

        match tx.execute(
            &self.queries.insert,
            params![name, length, since, pending.hash.as_bytes(), content],
        ) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(SqlError::Conflict(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(())
    }
}

impl StreamStore for SqliteStreamStore {
    fn config(&self) -> &StoreConfig {
        &self.store
    }

    fn find(&self, name: &str, as_of: DateTime<Utc>) -> StoreResult<Option<StorageEntry>> {
        let mut found = self.query_entries(&self.queries.find, params![to_micros(as_of), name])?;
        Ok(found.pop())
    }

    fn history(&self, name: &str) -> StoreResult<Vec<StorageEntry>> {
        Ok(self.query_entries(&self.queries.history, params![name])?)
    }

    fn inventory(&self, as_of: DateTime<Utc>) -> StoreResult<Vec<StorageEntry>> {
        Ok(self.query_entries(&self.queries.inventory, params![to_micros(as_of)])?)
    }

    fn open_entry(&self, entry: &StorageEntry) -> StoreResult<SourceStream> {
        let conn = self.conn.lock();
        let content: Option<Vec<u8>> = conn
            .query_row(
                &self.queries.content,
                params![
                    entry.name(),
                    to_micros(entry.valid_since()),
                    entry.hash().as_bytes()
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqlError::from)?;
        match content {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => Err(StoreError::EntryNotFound {
                name: entry.name().to_string(),
                valid_since: entry.valid_since(),
            }),
        }
    }

    fn commit(
        &self,
        previous: Option<&StorageEntry>,
        pending: PendingEntry,
        content: Vec<u8>,
    ) -> StoreResult<StorageEntry> {
        match self.commit_rows(previous, &pending, &content) {
            Ok(()) => Ok(pending.into_entry()),
            Err(SqlError::Conflict(name)) => {
                warn!(%name, table = %self.sql.table, "open version changed since it was read, rolled back");
                Err(StoreError::ConcurrencyConflict { name })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SqliteStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStreamStore")
            .field("path", &self.sql.path)
            .field("table", &self.sql.table)
            .field("digest", &self.store.digest)
            .finish()
    }
}
