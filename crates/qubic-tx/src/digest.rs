//! KangarooTwelve digests used for identities, key derivation, and transaction hashing.

use tiny_keccak::{Hasher, KangarooTwelve};

/// Size of a transaction or key digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Computes an `N`-byte KangarooTwelve output over `data` with an empty customization string.
#[must_use]
pub fn k12<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut hasher = KangarooTwelve::new(b"");
    hasher.update(data);
    let mut output = [0_u8; N];
    hasher.finalize(&mut output);
    output
}
