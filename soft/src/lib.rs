//! Software implementations of the applet's cryptographic abstractions,
//! built on the RustCrypto crates. Intended for testing and for running the
//! applet logic on hardware without its own crypto engine.

extern crate alloc;

use kma_common::crypto;
use std::time::Instant;

pub mod aes;
pub mod cmac;
pub mod des;
pub mod ec;
pub mod hmac;
pub mod rng;
pub mod rsa;

pub use aes::SoftAes;
pub use cmac::SoftAesCmac;
pub use des::SoftDes;
pub use ec::SoftEc;
pub use hmac::SoftHmac;
pub use rng::SoftRng;
pub use rsa::SoftRsa;

/// Constant-time comparison via the `subtle` crate.
pub struct SoftEq;

impl crypto::ConstTimeEq for SoftEq {
    fn eq(&self, left: &[u8], right: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        if left.len() != right.len() {
            return false;
        }
        left.ct_eq(right).into()
    }
}

/// Monotonic clock reporting the time since its own creation.
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl crypto::MonotonicClock for StdClock {
    fn now(&self) -> crypto::MillisecondsSinceEpoch {
        crypto::MillisecondsSinceEpoch(self.start.elapsed().as_millis() as i64)
    }
}

/// Build a complete [`crypto::Implementation`] from the software
/// implementations.
pub fn implementation() -> crypto::Implementation {
    crypto::Implementation {
        rng: Box::new(SoftRng),
        verify: Box::new(SoftEq),
        aes: Box::new(SoftAes),
        des: Box::new(SoftDes),
        hmac: Box::new(SoftHmac),
        cmac: Box::new(SoftAesCmac),
        rsa: Box::new(SoftRsa),
        ec: Box::new(SoftEc),
        clock: Some(Box::new(StdClock::new())),
    }
}
