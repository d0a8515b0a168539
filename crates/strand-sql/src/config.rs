//! Connection and table settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};

const MEMORY_PATH: &str = ":memory:";

/// SQLite backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Database file, or `:memory:` for a private in-memory database
    pub path: PathBuf,
    /// Table holding the versions; several stores can share one database
    pub table: String,
    /// How long a writer waits for a competing lock before failing
    pub busy_timeout_ms: u64,
    /// Enable WAL journaling (ignored for in-memory databases)
    pub wal_mode: bool,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("strand.db"),
            table: "StreamEntries".to_string(),
            busy_timeout_ms: 5000,
            wal_mode: true,
        }
    }
}

impl SqlConfig {
    /// Configuration for a database file at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database
    pub fn memory() -> Self {
        Self {
            path: PathBuf::from(MEMORY_PATH),
            wal_mode: false,
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    /// The table name is spliced into SQL text, so it must be a plain identifier.
    pub fn validate(&self) -> SqlResult<()> {
        let mut chars = self.table.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && self.table.len() <= 64
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(SqlError::InvalidTable(self.table.clone()))
        }
    }
}
