//! Functionality related to triple DES encryption.

use crate::{km_err, tag, try_to_vec, Error};
use alloc::vec::Vec;
use kma_wire::keymaster::{BlockMode, KeyParam, PaddingMode};
use kma_wire::KeySizeInBits;
use zeroize::ZeroizeOnDrop;

/// Size of a DES block in bytes.
pub const BLOCK_SIZE: usize = 8;

/// Size of a 3-DES key in bytes (3 x 64-bit DES keys, parity bits included).
pub const KEY_SIZE_BYTES: usize = 24;

/// The key size in bits that is advertised externally; the 24 parity bits are
/// not counted.
pub const KEY_SIZE_BITS: KeySizeInBits = KeySizeInBits(168);

/// A triple DES key.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Create a new [`Key`], checking the length.
    pub fn new(data: Vec<u8>) -> Result<Key, Error> {
        if data.len() != KEY_SIZE_BYTES {
            Err(km_err!(UnsupportedKeySize, "3-DES keys must be 24 bytes not {}", data.len()))
        } else {
            Ok(Key(data))
        }
    }

    /// Create a new [`Key`] from a slice.
    pub fn new_from(data: &[u8]) -> Result<Key, Error> {
        Key::new(try_to_vec(data)?)
    }
}

/// Mode of DES operation, along with the nonce where the mode needs one.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    EcbNoPadding,
    EcbPkcs7Padding,
    CbcNoPadding { nonce: [u8; BLOCK_SIZE] },
    CbcPkcs7Padding { nonce: [u8; BLOCK_SIZE] },
}

impl Mode {
    /// Determine the [`Mode`], given key parameters and an optional
    /// caller-provided nonce.
    pub fn new(
        params: &[KeyParam],
        caller_nonce: Option<&Vec<u8>>,
        rng: &mut dyn super::Rng,
    ) -> Result<Self, Error> {
        let mode = tag::get_block_mode(params)?;
        let padding = tag::get_padding_mode(params)?;
        match mode {
            BlockMode::Ecb => {
                if caller_nonce.is_some() {
                    return Err(km_err!(InvalidNonce, "nonce unexpectedly provided for ECB mode"));
                }
                match padding {
                    PaddingMode::None => Ok(Mode::EcbNoPadding),
                    PaddingMode::Pkcs7 => Ok(Mode::EcbPkcs7Padding),
                    _ => Err(km_err!(
                        UnsupportedPaddingMode,
                        "padding mode {:?} not supported for DES-ECB",
                        padding
                    )),
                }
            }
            BlockMode::Cbc => {
                let nonce: [u8; BLOCK_SIZE] = super::nonce(BLOCK_SIZE, caller_nonce, rng)?
                    .try_into()
                    .map_err(|_e| km_err!(InvalidNonce, "want {} byte nonce", BLOCK_SIZE))?;
                match padding {
                    PaddingMode::None => Ok(Mode::CbcNoPadding { nonce }),
                    PaddingMode::Pkcs7 => Ok(Mode::CbcPkcs7Padding { nonce }),
                    _ => Err(km_err!(
                        UnsupportedPaddingMode,
                        "padding mode {:?} not supported for DES-CBC",
                        padding
                    )),
                }
            }
            _ => Err(km_err!(UnsupportedBlockMode, "block mode {:?} not supported for DES", mode)),
        }
    }
}
