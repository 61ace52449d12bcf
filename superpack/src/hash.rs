//! Content hashing for pack integrity verification.
//!
//! The footer of every superpack declares a hash over the archive body. The
//! same algorithm must be used when the archive is written and when the
//! downloaded bytes are verified, so the hasher is an injected collaborator
//! rather than a free function.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length in bytes of a [`ContentHash`].
pub const HASH_LEN: usize = 32;

/// A fixed-width content digest as stored in the footer block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal representation.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

/// Deterministic hash over a byte range.
pub trait ContentHasher: Send + Sync {
    /// Hash the given bytes.
    fn hash(&self, data: &[u8]) -> ContentHash;

    /// Hash `data` and compare it against `expected`.
    fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }
}

/// SHA-256 hasher, the algorithm used by [`crate::format::PackWriter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

/// Chunk size fed to the digest at a time (64KB).
const CHUNK_SIZE: usize = 64 * 1024;

impl ContentHasher for Sha256Hasher {
    fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        for chunk in data.chunks(CHUNK_SIZE) {
            hasher.update(chunk);
        }
        ContentHash(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hello_world() {
        let hash = Sha256Hasher.hash(b"hello world");

        assert_eq!(
            hash.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_empty() {
        let hash = Sha256Hasher.hash(b"");

        assert_eq!(
            hash.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_chunked_hash_matches_single_pass() {
        let data = vec![0xABu8; 200_000];
        let chunked = Sha256Hasher.hash(&data);

        let single: [u8; HASH_LEN] = Sha256::digest(&data).into();
        assert_eq!(chunked, ContentHash::from_bytes(single));
    }

    #[test]
    fn test_verify() {
        let expected = Sha256Hasher.hash(b"pack body");

        assert!(Sha256Hasher.verify(b"pack body", &expected));
        assert!(!Sha256Hasher.verify(b"pack b0dy", &expected));
    }

    #[test]
    fn test_display_is_hex() {
        let hash = ContentHash::from_bytes([0x0f; HASH_LEN]);
        assert_eq!(format!("{}", hash), "0f".repeat(HASH_LEN));
    }
}
