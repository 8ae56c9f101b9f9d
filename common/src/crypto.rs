//! Abstractions and related types for accessing cryptographic primitives
//! and related functionality.

use crate::{km_err, vec_try_with_capacity, Error, FallibleAllocExt};
use alloc::vec::Vec;
use kma_wire::cbor;
use kma_wire::keymaster::{Algorithm, EcCurve, KeyPurpose, Timestamp};
use kma_wire::{cbor_type_error, vec_try, AsCborValue, CborError};

pub mod aes;
pub mod des;
pub mod ec;
pub mod hmac;
pub mod rsa;
mod traits;
pub use traits::*;

/// Size of a SHA-256 digest in bytes.
pub const SHA256_DIGEST_LEN: usize = 32;

/// Milliseconds since an arbitrary epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MillisecondsSinceEpoch(pub i64);

impl From<MillisecondsSinceEpoch> for Timestamp {
    fn from(value: MillisecondsSinceEpoch) -> Timestamp {
        Timestamp { milliseconds: value.0 }
    }
}

impl From<Timestamp> for MillisecondsSinceEpoch {
    fn from(value: Timestamp) -> MillisecondsSinceEpoch {
        MillisecondsSinceEpoch(value.milliseconds)
    }
}

/// Plaintext key material.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Aes(aes::Key),
    TripleDes(des::Key),
    Hmac(hmac::Key),
    Rsa(rsa::Key),
    Ec(EcCurve, ec::Key),
}

impl KeyMaterial {
    /// Indicate the algorithm of the key material.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyMaterial::Aes(_) => Algorithm::Aes,
            KeyMaterial::TripleDes(_) => Algorithm::TripleDes,
            KeyMaterial::Hmac(_) => Algorithm::Hmac,
            KeyMaterial::Rsa(_) => Algorithm::Rsa,
            KeyMaterial::Ec(_, _) => Algorithm::Ec,
        }
    }

    /// Indicate whether the key material is for an asymmetric key.
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, Self::Rsa(_) | Self::Ec(_, _))
    }
}

// Manual implementation of [`Debug`] that skips the key material itself.
impl core::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            KeyMaterial::Aes(k) => write!(f, "Aes({} bit key)", k.size().0),
            KeyMaterial::TripleDes(_) => write!(f, "TripleDes(168 bit key)"),
            KeyMaterial::Hmac(k) => write!(f, "Hmac({} bit key)", k.size().0),
            KeyMaterial::Rsa(_) => write!(f, "Rsa(...)"),
            KeyMaterial::Ec(c, _) => write!(f, "Ec({:?}, ...)", c),
        }
    }
}

impl AsCborValue for KeyMaterial {
    fn from_cbor_value(value: cbor::value::Value) -> Result<Self, CborError> {
        let mut a = match value {
            cbor::value::Value::Array(a) => a,
            _ => return cbor_type_error(&value, "arr"),
        };
        if a.len() < 2 {
            return Err(CborError::UnexpectedItem("short arr", "arr len 2/3"));
        }
        let rest = a.split_off(1);
        let algo = Algorithm::from_cbor_value(a.remove(0))?;
        let mut rest = rest;
        match algo {
            Algorithm::Aes => {
                let data = <Vec<u8>>::from_cbor_value(rest.remove(0))?;
                let key = aes::Key::new(data).map_err(|_e| CborError::InvalidValue)?;
                Ok(KeyMaterial::Aes(key))
            }
            Algorithm::TripleDes => {
                let data = <Vec<u8>>::from_cbor_value(rest.remove(0))?;
                let key = des::Key::new(data).map_err(|_e| CborError::InvalidValue)?;
                Ok(KeyMaterial::TripleDes(key))
            }
            Algorithm::Hmac => {
                let data = <Vec<u8>>::from_cbor_value(rest.remove(0))?;
                Ok(KeyMaterial::Hmac(hmac::Key(data)))
            }
            Algorithm::Rsa => {
                let data = <Vec<u8>>::from_cbor_value(rest.remove(0))?;
                Ok(KeyMaterial::Rsa(rsa::Key(data)))
            }
            Algorithm::Ec => {
                if rest.len() != 2 {
                    return Err(CborError::UnexpectedItem("arr", "arr len 3"));
                }
                let data = <Vec<u8>>::from_cbor_value(rest.remove(1))?;
                let curve = EcCurve::from_cbor_value(rest.remove(0))?;
                Ok(KeyMaterial::Ec(curve, ec::Key(data)))
            }
        }
    }

    fn to_cbor_value(self) -> Result<cbor::value::Value, CborError> {
        Ok(cbor::value::Value::Array(match self {
            KeyMaterial::Aes(k) => {
                let data = match &k {
                    aes::Key::Aes128(d) => &d[..],
                    aes::Key::Aes192(d) => &d[..],
                    aes::Key::Aes256(d) => &d[..],
                };
                vec_try![
                    Algorithm::Aes.to_cbor_value()?,
                    cbor::value::Value::Bytes(
                        crate::try_to_vec(data).map_err(|_| CborError::AllocationFailed)?
                    ),
                ]?
            }
            KeyMaterial::TripleDes(k) => vec_try![
                Algorithm::TripleDes.to_cbor_value()?,
                cbor::value::Value::Bytes(
                    crate::try_to_vec(&k.0).map_err(|_| CborError::AllocationFailed)?
                ),
            ]?,
            KeyMaterial::Hmac(k) => vec_try![
                Algorithm::Hmac.to_cbor_value()?,
                cbor::value::Value::Bytes(
                    crate::try_to_vec(&k.0).map_err(|_| CborError::AllocationFailed)?
                ),
            ]?,
            KeyMaterial::Rsa(k) => vec_try![
                Algorithm::Rsa.to_cbor_value()?,
                cbor::value::Value::Bytes(
                    crate::try_to_vec(&k.0).map_err(|_| CborError::AllocationFailed)?
                ),
            ]?,
            KeyMaterial::Ec(curve, k) => vec_try![
                Algorithm::Ec.to_cbor_value()?,
                curve.to_cbor_value()?,
                cbor::value::Value::Bytes(
                    crate::try_to_vec(&k.0).map_err(|_| CborError::AllocationFailed)?
                ),
            ]?,
        }))
    }
}

/// Direction of a symmetric cipher operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetricOperation {
    Encrypt,
    Decrypt,
}

impl TryFrom<KeyPurpose> for SymmetricOperation {
    type Error = Error;
    fn try_from(purpose: KeyPurpose) -> Result<Self, Error> {
        match purpose {
            KeyPurpose::Encrypt => Ok(SymmetricOperation::Encrypt),
            KeyPurpose::Decrypt => Ok(SymmetricOperation::Decrypt),
            _ => Err(km_err!(UnsupportedPurpose, "purpose {:?} not symmetric cipher", purpose)),
        }
    }
}

/// Return the `caller_nonce` if provided (checking its length), or generate a
/// fresh nonce of the given length.
pub fn nonce(
    size: usize,
    caller_nonce: Option<&Vec<u8>>,
    rng: &mut dyn Rng,
) -> Result<Vec<u8>, Error> {
    match caller_nonce {
        Some(n) => {
            if n.len() == size {
                crate::try_to_vec(n)
            } else {
                Err(km_err!(InvalidNonce, "want {} byte nonce not {}", size, n.len()))
            }
        }
        None => {
            let mut n = kma_wire::vec_try_fill_with_alloc_err(0u8, size, || {
                Error::Alloc("nonce allocation failed")
            })?;
            rng.fill_bytes(&mut n);
            Ok(n)
        }
    }
}

/// Compute an HMAC-SHA256 over a sequence of data chunks.
pub fn hmac_sha256(hmac: &dyn Hmac, key: &[u8], chunks: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let mut op = hmac.begin(
        hmac::Key(crate::try_to_vec(key)?),
        kma_wire::keymaster::Digest::Sha256,
    )?;
    for chunk in chunks {
        op.update(chunk)?;
    }
    op.finish()
}

/// AES-CMAC KDF from NIST SP 800-108 in counter mode (see section 5.1), as
/// needed for shared-secret negotiation.
impl<T: AesCmac + ?Sized> Ckdf for T {
    fn ckdf(
        &self,
        key: &aes::Key,
        label: &[u8],
        chunks: &[&[u8]],
        out_len: usize,
    ) -> Result<Vec<u8>, Error> {
        // Note: the variables i and l correspond to i and L in the standard.
        let blocks: u32 = ((out_len + aes::BLOCK_SIZE - 1) / aes::BLOCK_SIZE) as u32;
        let l = (out_len * 8) as u32;
        let net_order_l = l.to_be_bytes();
        let zero_byte: [u8; 1] = [0];
        let mut output = vec_try_with_capacity!(out_len)?;

        for i in 1u32..=blocks {
            let mut operation = self.begin(key.clone())?;
            operation.update(&i.to_be_bytes())?;
            operation.update(label)?;
            operation.update(&zero_byte)?;
            for chunk in chunks {
                operation.update(chunk)?;
            }
            operation.update(&net_order_l)?;
            output.try_extend_from_slice(&operation.finish()?)?;
        }
        output.truncate(out_len);
        Ok(output)
    }
}
