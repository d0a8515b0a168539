//! Foundation types for strand, a versioned, content-addressed stream store.
//!
//! Every other strand crate depends on `strand-types`.
//!
//! # Key Types
//!
//! - [`StorageEntry`] — one committed version of a named stream and its validity interval
//! - [`PendingEntry`] — metadata for a version on its way into a backend
//! - [`ContentDigest`] — digest of a version's exact bytes, compared for dedup
//! - [`temporal`] — as-of lookup over a `valid_since`-ordered timeline
//!
//! # Timeline Invariants
//!
//! For a fixed name, versions are totally ordered by `valid_since`, their
//! `[valid_since, valid_until)` intervals never overlap, and at most one of
//! them is open. `valid_until` is written once and never changes again.

pub mod digest;
pub mod entry;
pub mod error;
pub mod temporal;

pub use digest::ContentDigest;
pub use entry::{PendingEntry, StorageEntry};
pub use error::EntryError;
