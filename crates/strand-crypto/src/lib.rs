//! Hashing primitives for strand.
//!
//! Provides the pluggable streaming digest the store hashes content with
//! (BLAKE3 by default, SHA-256 as an alternative) and the one-pass
//! buffer-and-hash reader used by every write.
//!
//! All crypto operations wrap established libraries — no custom cryptography.

pub mod buffer;
pub mod hasher;

pub use buffer::{read_hashed, HashedContent, ReadError};
pub use hasher::{DigestAlgorithm, HasherError, StreamDigest};
