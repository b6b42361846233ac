//! Deterministic bucket assignment from `(seed, key)` to `[0, NUM_BUCKETS)`.
//!
//! This algorithm must be bit-exact across implementations: changing it
//! would reshuffle every live experiment. See the reference vectors in
//! the test module below.

use sha1::{Digest, Sha1};

/// Number of buckets every bucketing provider divides the population into.
pub const NUM_BUCKETS: u32 = 1000;

/// `bucket(seed, key) -> [0, NUM_BUCKETS)`.
///
/// The digest is SHA-1 over the UTF-8 concatenation `seed || key`,
/// interpreted as a big-endian unsigned integer, reduced modulo
/// `NUM_BUCKETS`. We fold the 20-byte digest through Horner's method
/// rather than pulling in a bignum crate: `N mod m` computed digit by
/// digit in base 256 is exact for any modulus, and `NUM_BUCKETS` is
/// small enough that every intermediate `acc * 256 + byte` fits in a
/// `u32` with room to spare.
pub fn bucket(seed: &str, key: &str) -> u32 {
    let mut hasher = Sha1::new();
    hasher.update(seed.as_bytes());
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();

    digest
        .iter()
        .fold(0u32, |acc, &byte| (acc * 256 + byte as u32) % NUM_BUCKETS)
}
