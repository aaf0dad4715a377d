//! Content hashing for duplicate detection and change tracking.

use sha2::{Digest, Sha256};

/// SHA-256 hash of raw file bytes, hex-encoded.
///
/// Two units with distinct paths but equal hashes form a duplicate group;
/// the incremental pipeline also uses the hash as its change signal.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"hello "));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = content_hash(b"");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
