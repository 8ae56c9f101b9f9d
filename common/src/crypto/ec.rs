//! Functionality related to elliptic curve signing.

use crate::{km_err, Error};
use alloc::vec::Vec;
use kma_wire::keymaster::EcCurve;
use kma_wire::KeySizeInBits;
use zeroize::ZeroizeOnDrop;

/// An EC key pair, in a format that is opaque outside the crypto
/// implementation that produced it.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct Key(pub Vec<u8>);

/// Return the key size for a curve.
pub fn curve_to_key_size(curve: EcCurve) -> KeySizeInBits {
    KeySizeInBits(match curve {
        EcCurve::P224 => 224,
        EcCurve::P256 => 256,
        EcCurve::P384 => 384,
        EcCurve::P521 => 521,
    })
}

/// Return the curve that matches a key size, if any.
pub fn key_size_to_curve(key_size: KeySizeInBits) -> Result<EcCurve, Error> {
    match key_size.0 {
        224 => Ok(EcCurve::P224),
        256 => Ok(EcCurve::P256),
        384 => Ok(EcCurve::P384),
        521 => Ok(EcCurve::P521),
        s => Err(km_err!(UnsupportedKeySize, "no curve with {}-bit keys", s)),
    }
}
