//! SQLite backend for strand.
//!
//! [`SqliteStreamStore`] keeps each version as one row
//! `(Id, FileName, FileLength, ValidSince, ValidUntil, Hash, RawStorage)`.
//! Lookups are parameterized `SELECT`s over the validity predicate
//! `ValidSince <= t AND (ValidUntil > t OR ValidUntil IS NULL)`; a commit
//! closes the previous open row with an `UPDATE` guarded on its hash and
//! inserts the new one inside a single transaction. Zero rows updated means
//! another writer got there first, and the whole transaction rolls back.

pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::SqlConfig;
pub use error::{SqlError, SqlResult};
pub use store::{SqliteStreamStore, TableStats};
