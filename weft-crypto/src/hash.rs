use sha2::{Digest, Sha384};
use weft_types::primitives::{Hash, HASH_LEN};

/// Hash multiple pieces of data together (plain concatenation).
pub fn sha384_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha384::new();
    for part in parts {
        hasher.update(part);
    }
    finalize(hasher)
}

fn finalize(hasher: Sha384) -> Hash {
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Incremental SHA-384 over unambiguously encoded fields.
///
/// Every variable-length field is written with a 4-byte little-endian length
/// prefix, numeric fields at fixed width, so two differently shaped inputs
/// can never produce the same byte stream. The domain tag is written first.
pub struct FieldHasher {
    inner: Sha384,
}

impl FieldHasher {
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha384::new(),
        };
        hasher.bytes(domain.as_bytes());
        hasher
    }

    /// Append a length-prefixed byte field.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update((data.len() as u32).to_le_bytes());
        self.inner.update(data);
        self
    }

    /// Append a length-prefixed UTF-8 field.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.inner.update(v.to_le_bytes());
        self
    }

    pub fn u128(&mut self, v: u128) -> &mut Self {
        self.inner.update(v.to_le_bytes());
        self
    }

    /// Append a fixed-width hash without a prefix.
    pub fn hash(&mut self, h: &Hash) -> &mut Self {
        self.inner.update(h);
        self
    }

    pub fn finish(self) -> Hash {
        finalize(self.inner)
    }
}
