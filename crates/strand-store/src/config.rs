use serde::{Deserialize, Serialize};
use strand_crypto::DigestAlgorithm;

/// Engine settings shared by every backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Algorithm content is hashed with for dedup.
    pub digest: DigestAlgorithm,
    /// Upper bound on a single version's size; `store` buffers the whole
    /// input in memory. `None` disables the bound.
    pub max_content_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::default(),
            max_content_bytes: Some(256 * 1024 * 1024),
        }
    }
}

impl StoreConfig {
    pub fn with_digest(digest: DigestAlgorithm) -> Self {
        Self {
            digest,
            ..Default::default()
        }
    }
}
