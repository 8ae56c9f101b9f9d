//! Functionality related to RSA signing/decryption.

use crate::{km_err, tag, Error};
use alloc::vec::Vec;
use kma_wire::keymaster::{Digest, KeyParam, PaddingMode};
use zeroize::ZeroizeOnDrop;

/// The only RSA key size accepted for key creation.
pub const REQUIRED_KEY_SIZE_BITS: u32 = 2048;

/// The only RSA public exponent accepted for key creation.
pub const REQUIRED_EXPONENT: u64 = 65537;

/// An RSA key pair, in a format that is opaque outside the crypto
/// implementation that produced it.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct Key(pub Vec<u8>);

/// RSA decryption mode. OAEP always uses MGF1 with SHA-1, matching the HAL
/// default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptionMode {
    NoPadding,
    OaepPadding { msg_digest: Digest },
    Pkcs1_1_5Padding,
}

impl DecryptionMode {
    /// Determine the RSA decryption mode from parameters.
    pub fn new(params: &[KeyParam]) -> Result<Self, Error> {
        let padding = tag::get_padding_mode(params)?;
        match padding {
            PaddingMode::None => Ok(DecryptionMode::NoPadding),
            PaddingMode::RsaOaep => {
                let msg_digest = tag::get_digest(params)?;
                Ok(DecryptionMode::OaepPadding { msg_digest })
            }
            PaddingMode::RsaPkcs115Encrypt => Ok(DecryptionMode::Pkcs1_1_5Padding),
            _ => Err(km_err!(
                UnsupportedPaddingMode,
                "padding mode {:?} not supported for RSA decryption",
                padding
            )),
        }
    }
}

/// RSA signing mode. `Digest::None` together with PKCS#1 v1.5 padding means
/// the pre-hashed input is signed without a `DigestInfo` prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignMode {
    NoPadding,
    Pkcs1_1_5Padding(Digest),
    Pss(Digest),
}

impl SignMode {
    /// Determine the RSA signing mode from parameters.
    pub fn new(params: &[KeyParam]) -> Result<Self, Error> {
        let padding = tag::get_padding_mode(params)?;
        match padding {
            PaddingMode::None => Ok(SignMode::NoPadding),
            PaddingMode::RsaPss => {
                let digest = tag::get_digest(params)?;
                Ok(SignMode::Pss(digest))
            }
            PaddingMode::RsaPkcs115Sign => {
                let digest = tag::get_digest(params)?;
                Ok(SignMode::Pkcs1_1_5Padding(digest))
            }
            _ => Err(km_err!(
                UnsupportedPaddingMode,
                "padding mode {:?} not supported for RSA signing",
                padding
            )),
        }
    }
}
