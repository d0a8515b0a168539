//! Versioned, content-addressed storage of named byte streams.
//!
//! Every `store` of a name either appends a new version or, when the bytes
//! hash the same as the live version, does nothing. Versions are never
//! rewritten; each carries a half-open validity interval
//! `[valid_since, valid_until)` so any past instant can be looked up.
//!
//! # Storage Backends
//!
//! All backends implement the [`StreamStore`] trait:
//!
//! - [`InMemoryStreamStore`] -- `BTreeMap`-based store for tests and embedding
//! - `SqliteStreamStore` in the `strand-sql` crate -- durable single-table store
//!
//! # Design Rules
//!
//! 1. Per name, validity intervals never overlap and at most one is open.
//! 2. `valid_since` strictly increases per name, at microsecond precision.
//! 3. Identical content never produces a second consecutive version.
//! 4. A commit only lands if the open version is still the one its writer
//!    read; otherwise it fails with a concurrency conflict and changes nothing.
//! 5. Concurrent reads are always safe (committed content is immutable).
//! 6. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod memory;
pub mod source;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStreamStore;
pub use source::{EntrySource, LatestSource};
pub use traits::{validate_name, StreamStore};
