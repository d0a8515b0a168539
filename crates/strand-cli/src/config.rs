use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strand_sql::SqlConfig;
use strand_store::StoreConfig;

/// Environment variable overriding the database path
pub const DB_ENV: &str = "STRAND_DB";

const DEFAULT_FILE: &str = "strand.toml";

/// Contents of `strand.toml`
///
/// ```toml
/// [store]
/// digest = "sha256"
///
/// [sql]
/// path = "/var/lib/strand/strand.db"
/// table = "StreamEntries"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: StoreConfig,
    pub sql: SqlConfig,
}

impl CliConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load `explicit`, or `./strand.toml` if present, or defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_FILE)).filter(|p| p.is_file()),
        };
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply the database path overrides, strongest last.
    pub fn with_overrides(mut self, env_db: Option<PathBuf>, flag_db: Option<PathBuf>) -> Self {
        if let Some(path) = flag_db.or(env_db) {
            self.sql.path = path;
        }
        self
    }
}
