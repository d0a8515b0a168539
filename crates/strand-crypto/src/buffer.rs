use std::io::{self, ErrorKind, Read};

use strand_types::ContentDigest;

use crate::hasher::DigestAlgorithm;

const CHUNK_SIZE: usize = 64 * 1024;

/// A fully buffered stream together with the digest of its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashedContent {
    pub bytes: Vec<u8>,
    pub digest: ContentDigest,
}

impl HashedContent {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Errors from [`read_hashed`].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("content exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// Read `reader` to the end once, buffering and hashing in the same pass.
///
/// The reader is borrowed, never closed. `length_hint` pre-sizes the buffer
/// when the caller knows the stream length; it is a hint, not a bound.
/// Reading stops with [`ReadError::TooLarge`] as soon as more than `limit`
/// bytes have arrived.
pub fn read_hashed(
    reader: &mut dyn Read,
    algorithm: DigestAlgorithm,
    length_hint: Option<u64>,
    limit: Option<u64>,
) -> Result<HashedContent, ReadError> {
    let capacity = match (length_hint, limit) {
        (Some(hint), Some(limit)) => hint.min(limit),
        (Some(hint), None) => hint,
        (None, _) => 0,
    };
    let mut bytes = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
    let mut hasher = algorithm.hasher();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if let Some(limit) = limit {
            if (bytes.len() + read) as u64 > limit {
                return Err(ReadError::TooLarge { limit });
            }
        }
        hasher.update(&chunk[..read]);
        bytes.extend_from_slice(&chunk[..read]);
    }

    Ok(HashedContent {
        bytes,
        digest: hasher.finalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields at most `step` bytes per read and reports `Interrupted` once.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        interrupted: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(ErrorKind::Interrupted, "try again"));
            }
            let end = (self.pos + self.step).min(self.data.len()).min(self.pos + buf.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    #[test]
    fn buffers_and_hashes_in_one_pass() {
        let data = b"The quick brown fox".to_vec();
        let content = read_hashed(&mut Cursor::new(data.clone()), DigestAlgorithm::Blake3, None, None).unwrap();
        assert_eq!(content.bytes, data);
        assert_eq!(content.digest, DigestAlgorithm::Blake3.digest(&data));
        assert_eq!(content.len(), data.len() as u64);
    }

    #[test]
    fn handles_short_reads_and_interrupts() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = Trickle {
            data: data.clone(),
            pos: 0,
            step: 1000,
            interrupted: false,
        };
        let content = read_hashed(&mut reader, DigestAlgorithm::Sha256, None, None).unwrap();
        assert_eq!(content.bytes, data);
        assert_eq!(content.digest, DigestAlgorithm::Sha256.digest(&data));
    }

    #[test]
    fn empty_stream_has_digest() {
        let content = read_hashed(&mut io::empty(), DigestAlgorithm::Blake3, Some(0), None).unwrap();
        assert!(content.is_empty());
        assert_eq!(content.digest, DigestAlgorithm::Blake3.digest(b""));
    }

    #[test]
    fn length_hint_presizes_buffer() {
        let data = vec![9u8; 4096];
        let content = read_hashed(&mut Cursor::new(data), DigestAlgorithm::Blake3, Some(4096), None).unwrap();
        assert!(content.bytes.capacity() >= 4096);
    }

    #[test]
    fn wrong_length_hint_is_harmless() {
        let data = vec![1u8; 100];
        let content = read_hashed(&mut Cursor::new(data.clone()), DigestAlgorithm::Blake3, Some(3), None).unwrap();
        assert_eq!(content.bytes, data);
    }

    #[test]
    fn limit_is_enforced() {
        let data = vec![0u8; 1025];
        let err = read_hashed(&mut Cursor::new(data), DigestAlgorithm::Blake3, None, Some(1024)).unwrap_err();
        assert!(matches!(err, ReadError::TooLarge { limit: 1024 }));
    }

    #[test]
    fn content_exactly_at_limit_is_accepted() {
        let data = vec![0u8; 1024];
        let content = read_hashed(&mut Cursor::new(data), DigestAlgorithm::Blake3, None, Some(1024)).unwrap();
        assert_eq!(content.len(), 1024);
    }

    #[test]
    fn reader_is_left_usable() {
        let mut cursor = Cursor::new(b"abc".to_vec());
        read_hashed(&mut cursor, DigestAlgorithm::Blake3, None, None).unwrap();
        // Borrowed, not consumed: the caller still owns the reader.
        assert_eq!(cursor.position(), 3);
    }
}
