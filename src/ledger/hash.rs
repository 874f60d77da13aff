//! Blake2b digests used for key hashes, script hashes and transaction ids.

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// 28-byte digest (key hashes, policy ids).
pub fn blake2b_224(parts: &[&[u8]]) -> [u8; 28] {
    let mut hasher = Blake2b224::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// 32-byte digest (transaction ids, metadata and script-data hashes).
pub fn blake2b_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
