//! Functionality related to AES encryption.

use crate::{km_err, tag, try_to_vec, Error};
use alloc::vec::Vec;
use kma_wire::keymaster::{BlockMode, KeyParam, PaddingMode};
use kma_wire::KeySizeInBits;
use zeroize::ZeroizeOnDrop;

/// Size of an AES block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of AES-GCM nonce in bytes.
pub const GCM_NONCE_SIZE: usize = 12;

/// AES variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Aes128,
    Aes192,
    Aes256,
}

impl TryFrom<KeySizeInBits> for Variant {
    type Error = Error;
    fn try_from(size: KeySizeInBits) -> Result<Self, Error> {
        match size.0 {
            128 => Ok(Variant::Aes128),
            192 => Ok(Variant::Aes192),
            256 => Ok(Variant::Aes256),
            s => Err(km_err!(UnsupportedKeySize, "AES keys of size {} not supported", s)),
        }
    }
}

/// An AES key.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub enum Key {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl Key {
    /// Create a new [`Key`], taking ownership of the data and checking it is
    /// a valid length.
    pub fn new(data: Vec<u8>) -> Result<Key, Error> {
        match data.len() {
            16 => Ok(Key::Aes128(
                data.try_into().map_err(|_e| km_err!(UnknownError, "failed to convert"))?,
            )),
            24 => Ok(Key::Aes192(
                data.try_into().map_err(|_e| km_err!(UnknownError, "failed to convert"))?,
            )),
            32 => Ok(Key::Aes256(
                data.try_into().map_err(|_e| km_err!(UnknownError, "failed to convert"))?,
            )),
            l => Err(km_err!(UnsupportedKeySize, "AES keys must be 16/24/32 bytes not {}", l)),
        }
    }

    /// Create a new [`Key`] from a slice.
    pub fn new_from(data: &[u8]) -> Result<Key, Error> {
        Key::new(try_to_vec(data)?)
    }

    /// Indicate the size of the key in bits.
    pub fn size(&self) -> KeySizeInBits {
        KeySizeInBits(match self {
            Key::Aes128(_) => 128,
            Key::Aes192(_) => 192,
            Key::Aes256(_) => 256,
        })
    }
}

/// Mode of non-AEAD AES operation.
#[derive(Clone, Copy, Debug)]
pub enum CipherMode {
    EcbNoPadding,
    EcbPkcs7Padding,
    CbcNoPadding { nonce: [u8; BLOCK_SIZE] },
    CbcPkcs7Padding { nonce: [u8; BLOCK_SIZE] },
    Ctr { nonce: [u8; BLOCK_SIZE] },
}

/// Mode of AEAD AES operation, along with the nonce to use.
#[derive(Clone, Copy, Debug)]
pub enum GcmMode {
    GcmTag12 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag13 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag14 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag15 { nonce: [u8; GCM_NONCE_SIZE] },
    GcmTag16 { nonce: [u8; GCM_NONCE_SIZE] },
}

/// Mode of AES operation.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    Cipher(CipherMode),
    Aead(GcmMode),
}

impl Mode {
    /// Determine the [`Mode`], given key parameters and an optional
    /// caller-provided nonce. A fresh random nonce is generated when the
    /// caller did not provide one.
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
                    PaddingMode::None => Ok(Mode::Cipher(CipherMode::EcbNoPadding)),
                    PaddingMode::Pkcs7 => Ok(Mode::Cipher(CipherMode::EcbPkcs7Padding)),
                    _ => Err(km_err!(
                        UnsupportedPaddingMode,
                        "padding mode {:?} not supported for AES-ECB",
                        padding
                    )),
                }
            }
            BlockMode::Cbc => {
                let nonce: [u8; BLOCK_SIZE] = super::nonce(BLOCK_SIZE, caller_nonce, rng)?
                    .try_into()
                    .map_err(|_e| km_err!(InvalidNonce, "want {} byte nonce", BLOCK_SIZE))?;
                match padding {
                    PaddingMode::None => Ok(Mode::Cipher(CipherMode::CbcNoPadding { nonce })),
                    PaddingMode::Pkcs7 => Ok(Mode::Cipher(CipherMode::CbcPkcs7Padding { nonce })),
                    _ => Err(km_err!(
                        UnsupportedPaddingMode,
                        "padding mode {:?} not supported for AES-CBC",
                        padding
                    )),
                }
            }
            BlockMode::Ctr => {
                if padding != PaddingMode::None {
                    return Err(km_err!(
                        IncompatiblePaddingMode,
                        "padding mode {:?} not supported for AES-CTR",
                        padding
                    ));
                }
                let nonce: [u8; BLOCK_SIZE] = super::nonce(BLOCK_SIZE, caller_nonce, rng)?
                    .try_into()
                    .map_err(|_e| km_err!(InvalidNonce, "want {} byte nonce", BLOCK_SIZE))?;
                Ok(Mode::Cipher(CipherMode::Ctr { nonce }))
            }
            BlockMode::Gcm => {
                if padding != PaddingMode::None {
                    return Err(km_err!(
                        IncompatiblePaddingMode,
                        "padding mode {:?} not supported for AES-GCM",
                        padding
                    ));
                }
                let nonce: [u8; GCM_NONCE_SIZE] = super::nonce(GCM_NONCE_SIZE, caller_nonce, rng)?
                    .try_into()
                    .map_err(|_e| km_err!(InvalidNonce, "want {} byte nonce", GCM_NONCE_SIZE))?;
                let tag_len = tag::get_mac_length(params)?;
                if tag_len % 8 != 0 {
                    return Err(km_err!(
                        InvalidMacLength,
                        "tag length {} not a multiple of 8 bits",
                        tag_len
                    ));
                }
                match tag_len / 8 {
                    12 => Ok(Mode::Aead(GcmMode::GcmTag12 { nonce })),
                    13 => Ok(Mode::Aead(GcmMode::GcmTag13 { nonce })),
                    14 => Ok(Mode::Aead(GcmMode::GcmTag14 { nonce })),
                    15 => Ok(Mode::Aead(GcmMode::GcmTag15 { nonce })),
                    16 => Ok(Mode::Aead(GcmMode::GcmTag16 { nonce })),
                    v => Err(km_err!(InvalidMacLength, "tag length {} out of range", v * 8)),
                }
            }
        }
    }

    /// Indicate whether the mode is an AEAD mode.
    pub fn is_aead(&self) -> bool {
        match self {
            Mode::Aead(_) => true,
            Mode::Cipher(_) => false,
        }
    }
}

impl GcmMode {
    /// Return the tag length (in bytes) for an AES-GCM mode.
    pub fn tag_len(&self) -> usize {
        match self {
            GcmMode::GcmTag12 { nonce: _ } => 12,
            GcmMode::GcmTag13 { nonce: _ } => 13,
            GcmMode::GcmTag14 { nonce: _ } => 14,
            GcmMode::GcmTag15 { nonce: _ } => 15,
            GcmMode::GcmTag16 { nonce: _ } => 16,
        }
    }
}
