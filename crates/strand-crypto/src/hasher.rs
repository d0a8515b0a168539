use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use strand_types::ContentDigest;

/// A digest computation fed incrementally.
///
/// Hashing and buffering of a stream happen in the same pass: callers
/// `update` with each chunk as it is read and `finalize` once at the end.
pub trait StreamDigest: Send {
    fn update(&mut self, data: &[u8]);

    /// Consume the state and produce the digest.
    fn finalize(self: Box<Self>) -> ContentDigest;
}

impl StreamDigest for blake3::Hasher {
    fn update(&mut self, data: &[u8]) {
        blake3::Hasher::update(self, data);
    }

    fn finalize(self: Box<Self>) -> ContentDigest {
        ContentDigest::from(*blake3::Hasher::finalize(&self).as_bytes())
    }
}

impl StreamDigest for sha2::Sha256 {
    fn update(&mut self, data: &[u8]) {
        sha2::Digest::update(self, data);
    }

    fn finalize(self: Box<Self>) -> ContentDigest {
        ContentDigest::new(sha2::Digest::finalize(*self).to_vec())
    }
}

/// The digest algorithm a store hashes content with.
///
/// Both choices are 256-bit. A store must keep using the algorithm it was
/// created with: dedup compares digests byte-for-byte, so switching
/// algorithms makes every next write look like new content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl DigestAlgorithm {
    /// Fresh incremental state for this algorithm.
    pub fn hasher(&self) -> Box<dyn StreamDigest> {
        match self {
            Self::Blake3 => Box::new(blake3::Hasher::new()),
            Self::Sha256 => Box::new(sha2::Sha256::new()),
        }
    }

    /// One-shot digest of an in-memory buffer.
    pub fn digest(&self, data: &[u8]) -> ContentDigest {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &ContentDigest) -> bool {
        self.digest(data) == *expected
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = HasherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(HasherError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}
