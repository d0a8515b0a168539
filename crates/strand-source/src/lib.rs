//! Composable stream sources for strand.
//!
//! A [`StreamSource`] lazily produces a readable byte stream. Sources nest:
//! each combinator owns the sources it wraps and decides, at open time,
//! where the bytes actually come from.
//!
//! # Leaf Sources
//!
//! - [`LocalFile`] — a file on disk (also a [`StreamSink`])
//! - [`BytesSource`] — an in-memory buffer
//! - [`FnSource`] — closures, e.g. a fetch from a remote origin
//!
//! # Combinators
//!
//! - [`Composite`] — first source that yields a stream wins
//! - [`MostRecent`] — source with the newest timestamp wins
//! - [`CachingSource`] — mirror a newer remote into a local file, then read locally
//! - [`Shielded`] — contain failures, expose the last error, return defaults
//! - [`Traced`] — log outcomes without changing them
//! - [`Failing`] — always fails; terminates a chain explicitly
//!
//! A typical chain: `MostRecent[LocalFile(cache), Composite[Shielded(network), Failing]]`.

pub mod composite;
pub mod error;
pub mod failing;
pub mod file;
pub mod memory;
pub mod mirror;
pub mod recent;
pub mod shield;
pub mod trace;
pub mod traits;

pub use composite::Composite;
pub use error::{SourceError, SourceResult};
pub use failing::Failing;
pub use file::LocalFile;
pub use memory::{BytesSource, FnSource};
pub use mirror::CachingSource;
pub use recent::MostRecent;
pub use shield::Shielded;
pub use trace::Traced;
pub use traits::{SourceStream, StreamSink, StreamSource};
