//! Content hashing.
//!
//! Every thread keeps its own BLAKE3 hasher. It is reset before each use and
//! never shared, so hashing never contends on a lock.

use std::cell::RefCell;
use std::fmt;

thread_local! {
    static HASHER: RefCell<blake3::Hasher> = RefCell::new(blake3::Hasher::new());
}

/// BLAKE3 digest of a raw payload (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 chars.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex string into a hash.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

/// Compute the content hash of the given bytes with this thread's hasher.
pub fn content_hash(data: &[u8]) -> ContentHash {
    HASHER.with(|cell| {
        let mut hasher = cell.borrow_mut();
        hasher.reset();
        hasher.update(data);
        ContentHash(*hasher.finalize().as_bytes())
    })
}
