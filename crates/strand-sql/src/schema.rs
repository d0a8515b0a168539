//! Table layout

use rusqlite::Connection;
use tracing::debug;

use crate::error::SqlResult;

/// Create the versions table and its indexes if missing.
///
/// Timestamps are microseconds since the Unix epoch. The partial unique
/// index allows at most one open row per name, which backs up the guarded
/// close in `commit` across processes.
pub fn ensure_table(conn: &Connection, table: &str) -> SqlResult<()> {
    debug!(table, "ensuring stream table");
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            FileName TEXT NOT NULL,
            FileLength INTEGER NOT NULL CHECK (FileLength >= 0),
            ValidSince INTEGER NOT NULL,
            ValidUntil INTEGER NULL,
            Hash BLOB NOT NULL,
            RawStorage BLOB NOT NULL,
            CHECK (ValidUntil IS NULL OR ValidUntil >= ValidSince)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS IX_{table}_FileName_ValidSince
            ON {table} (FileName, ValidSince);
        CREATE UNIQUE INDEX IF NOT EXISTS IX_{table}_Open
            ON {table} (FileName) WHERE ValidUntil IS NULL;
        CREATE INDEX IF NOT EXISTS IX_{table}_ValidSince
            ON {table} (ValidSince);"
    ))?;
    Ok(())
}

/// SQL text for every statement the store runs against one table.
#[derive(Debug, Clone)]
pub(crate) struct Queries {
    pub find: String,
    pub history: String,
    pub inventory: String,
    pub content: String,
    pub close: String,
    pub has_open: String,
    pub latest_since: String,
    pub insert: String,
    pub stats: String,
}

const COLUMNS: &str = "FileName, FileLength, ValidSince, ValidUntil, Hash";
const VALID_AT: &str = "ValidSince <= ?1 AND (ValidUntil > ?1 OR ValidUntil IS NULL)";

impl Queries {
    pub fn for_table(table: &str) -> Self {
        Self {
            find: format!(
                "SELECT {COLUMNS} FROM {table} WHERE FileName = ?2 AND {VALID_AT} \
                 ORDER BY ValidSince DESC LIMIT 1"
            ),
            history: format!(
                "SELECT {COLUMNS} FROM {table} WHERE FileName = ?1 ORDER BY ValidSince DESC"
            ),
            inventory: format!(
                "SELECT {COLUMNS} FROM {table} WHERE {VALID_AT} ORDER BY FileName"
            ),
            content: format!(
                "SELECT RawStorage FROM {table} WHERE FileName = ?1 AND ValidSince = ?2 AND Hash = ?3"
            ),
            close: format!(
                "UPDATE {table} SET ValidUntil = ?1 \
                 WHERE FileName = ?2 AND ValidSince = ?3 AND Hash = ?4 AND ValidUntil IS NULL"
            ),
            has_open: format!(
                "SELECT EXISTS (SELECT 1 FROM {table} WHERE FileName = ?1 AND ValidUntil IS NULL)"
            ),
            latest_since: format!("SELECT MAX(ValidSince) FROM {table} WHERE FileName = ?1"),
            insert: format!(
                "INSERT INTO {table} (FileName, FileLength, ValidSince, ValidUntil, Hash, RawStorage) \
                 VALUES (?1, ?2, ?3, NULL, ?4, ?5)"
            ),
            stats: format!(
                "SELECT COUNT(DISTINCT FileName), COUNT(*), COALESCE(SUM(FileLength), 0) FROM {table}"
            ),
        }
    }
}
