//! Random number generation based on the operating system's CSPRNG.

use kma_common::crypto;
use rand_core::{OsRng, RngCore};

/// [`crypto::Rng`] implementation drawing from [`OsRng`]. Caller-supplied
/// entropy is discarded; the OS generator is assumed to be fully seeded.
pub struct SoftRng;

impl crypto::Rng for SoftRng {
    fn add_entropy(&mut self, _data: &[u8]) {}

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}
