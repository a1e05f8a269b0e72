use md5::Md5;
use sha2::{Digest, Sha256};

/// Lowercase hex digests of one byte stream under all three algorithms.
#[derive(Debug, Clone)]
pub struct DigestSet {
    pub sha256: String,
    pub md5: String,
    pub blake3: String,
}

impl DigestSet {
    /// Compare against declared digests. Blake3 only participates when the
    /// manifest actually declares it; comparisons are case-insensitive.
    pub fn matches(&self, sha256: &str, md5: &str, blake3: Option<&str>) -> bool {
        if !self.sha256.eq_ignore_ascii_case(sha256) {
            return false;
        }
        if !self.md5.eq_ignore_ascii_case(md5) {
            return false;
        }
        match blake3 {
            Some(b3) if !b3.trim().is_empty() => self.blake3.eq_ignore_ascii_case(b3),
            _ => true,
        }
    }
}

/// Accumulates sha256, md5 and blake3 over one ordered byte stream.
/// Feeding order matters: callers must update in ascending file offset.
pub struct MultiHasher {
    sha256: Sha256,
    md5: Md5,
    blake3: blake3::Hasher,
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiHasher {
    pub fn new() -> Self {
        Self { sha256: Sha256::new(), md5: Md5::new(), blake3: blake3::Hasher::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.sha256.update(data);
        self.md5.update(data);
        self.blake3.update(data);
    }

    pub fn finalize(self) -> DigestSet {
        DigestSet {
            sha256: hex::encode(self.sha256.finalize()),
            md5: hex::encode(self.md5.finalize()),
            blake3: self.blake3.finalize().to_hex().to_string(),
        }
    }
}

/// One-shot digests for an in-memory buffer.
pub fn digest_all(data: &[u8]) -> DigestSet {
    let mut h = MultiHasher::new();
    h.update(data);
    h.finalize()
}
