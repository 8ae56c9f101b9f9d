//! Key blob encryption and decryption.
//!
//! A key blob holds the key's secret material AES-GCM-encrypted under a key
//! derived from the device's root key, bound to the key's characteristics and
//! to hidden parameters (application id/data and root of trust) that the
//! holder must present again to use the key. The blob that travels to the
//! caller is the CBOR array:
//!
//! ```text
//! [ secret_ciphertext, nonce, tag, characteristics, public_key? ]
//! ```
//!
//! with the fifth element present only for asymmetric keys.

use crate::crypto::{self, aes, hmac_sha256, KeyMaterial, SymmetricOperation};
use crate::{km_err, try_to_vec, vec_try_with_capacity, Error, FallibleAllocExt};
use alloc::vec::Vec;
use kma_wire::keymaster::{KeyCharacteristics, KeyParam};
use kma_wire::{cbor, cbor_type_error, AsCborValue, CborError};
use log::warn;

/// Nonce size for both GCM invocations.
pub const NONCE_SIZE: usize = aes::GCM_NONCE_SIZE;

/// Tag size for both GCM invocations.
pub const TAG_SIZE: usize = 12;

/// Size of the derived key-encryption key in bytes.
const KEK_SIZE: usize = 16;

/// An encrypted key blob, as held by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedKeyBlob {
    /// Ciphertext of the key's secret material.
    pub secret_ciphertext: Vec<u8>,
    /// Nonce used for both the derivation and the encryption.
    pub nonce: [u8; NONCE_SIZE],
    /// GCM tag over the secret material.
    pub tag: [u8; TAG_SIZE],
    /// Key characteristics, stored in plaintext but authenticated via the
    /// derived key.
    pub characteristics: KeyCharacteristics,
    /// Public key material, present for asymmetric keys only.
    pub public_key: Option<Vec<u8>>,
}

impl AsCborValue for EncryptedKeyBlob {
    fn from_cbor_value(value: cbor::value::Value) -> Result<Self, CborError> {
        let mut a = match value {
            cbor::value::Value::Array(a) if a.len() == 4 || a.len() == 5 => a,
            cbor::value::Value::Array(_) => {
                return Err(CborError::UnexpectedItem("arr", "arr len 4/5"))
            }
            _ => return cbor_type_error(&value, "arr"),
        };
        let public_key = if a.len() == 5 {
            Some(<Vec<u8>>::from_cbor_value(a.remove(4))?)
        } else {
            None
        };
        let characteristics = KeyCharacteristics::from_cbor_value(a.remove(3))?;
        let tag = <[u8; TAG_SIZE]>::from_cbor_value(a.remove(2))?;
        let nonce = <[u8; NONCE_SIZE]>::from_cbor_value(a.remove(1))?;
        let secret_ciphertext = <Vec<u8>>::from_cbor_value(a.remove(0))?;
        Ok(Self { secret_ciphertext, nonce, tag, characteristics, public_key })
    }

    fn to_cbor_value(self) -> Result<cbor::value::Value, CborError> {
        let mut a = vec_try_with_capacity!(5).map_err(|_e| CborError::AllocationFailed)?;
        a.push(cbor::value::Value::Bytes(self.secret_ciphertext));
        a.push(self.nonce.to_cbor_value()?);
        a.push(self.tag.to_cbor_value()?);
        a.push(self.characteristics.to_cbor_value()?);
        if let Some(public_key) = self.public_key {
            a.push(cbor::value::Value::Bytes(public_key));
        }
        Ok(cbor::value::Value::Array(a))
    }
}

/// A decrypted key blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextKeyBlob {
    /// Key characteristics.
    pub characteristics: KeyCharacteristics,
    /// Key material.
    pub key_material: KeyMaterial,
}

/// Build the authenticated data that binds a blob to its characteristics and
/// hidden parameters. This is the CBOR array holding every hardware-enforced
/// parameter, then every software-enforced parameter, then every hidden
/// parameter, then the public key material when present.
fn build_auth_data(
    characteristics: &KeyCharacteristics,
    hidden: &[KeyParam],
    public_key: Option<&Vec<u8>>,
) -> Result<Vec<u8>, Error> {
    let count = characteristics.hw_enforced.len()
        + characteristics.sw_enforced.len()
        + hidden.len()
        + if public_key.is_some() { 1 } else { 0 };
    let mut array = vec_try_with_capacity!(count)?;
    for param in characteristics
        .hw_enforced
        .iter()
        .chain(characteristics.sw_enforced.iter())
        .chain(hidden.iter())
    {
        array.push(param.clone().to_cbor_value()?);
    }
    if let Some(public_key) = public_key {
        array.push(cbor::value::Value::Bytes(try_to_vec(public_key)?));
    }
    let mut data = Vec::new();
    cbor::ser::into_writer(&cbor::value::Value::Array(array), &mut data)
        .map_err(|_e| Error::Alloc("failed to serialize auth data"))?;
    Ok(data)
}

/// Derive the key-encryption key for a blob. The root key is run over the
/// authenticated data in GCM mode, and the resulting ciphertext and tag are
/// folded through HMAC-SHA256 to give a 128-bit KEK.
fn derive_kek(
    aes_impl: &dyn crypto::Aes,
    hmac_impl: &dyn crypto::Hmac,
    root_key: &aes::Key,
    nonce: &[u8; NONCE_SIZE],
    auth_data: &[u8],
    hidden: &[KeyParam],
) -> Result<aes::Key, Error> {
    let mut hidden_data = Vec::new();
    let mut hidden_array = vec_try_with_capacity!(hidden.len())?;
    for param in hidden {
        hidden_array.push(param.clone().to_cbor_value()?);
    }
    cbor::ser::into_writer(&cbor::value::Value::Array(hidden_array), &mut hidden_data)
        .map_err(|_e| Error::Alloc("failed to serialize hidden params"))?;

    let mut op = aes_impl.begin_aead(
        root_key.clone(),
        aes::GcmMode::GcmTag12 { nonce: *nonce },
        SymmetricOperation::Encrypt,
    )?;
    op.update_aad(&hidden_data)?;
    let mut derived = op.update(auth_data)?;
    derived.try_extend_from_slice(&op.finish()?)?;
    if derived.len() < TAG_SIZE {
        return Err(km_err!(UnknownError, "derivation output too short"));
    }
    let split = derived.len() - TAG_SIZE;
    let derived_tag = &derived[split..];
    let derived_ct = &derived[..split];

    let full_kek = hmac_sha256(hmac_impl, derived_tag, &[derived_ct])?;
    let mut kek = [0u8; KEK_SIZE];
    kek.copy_from_slice(&full_kek[..KEK_SIZE]);
    Ok(aes::Key::Aes128(kek))
}

/// Encrypt key material into a key blob bound to `hidden`.
pub fn encrypt(
    aes_impl: &dyn crypto::Aes,
    hmac_impl: &dyn crypto::Hmac,
    rng: &mut dyn crypto::Rng,
    root_key: &aes::Key,
    plaintext: PlaintextKeyBlob,
    hidden: &[KeyParam],
    public_key: Option<Vec<u8>>,
) -> Result<EncryptedKeyBlob, Error> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let auth_data = build_auth_data(&plaintext.characteristics, hidden, public_key.as_ref())?;
    let kek = derive_kek(aes_impl, hmac_impl, root_key, &nonce, &auth_data, hidden)?;

    let secret = plaintext.key_material.clone().into_vec()?;
    let mut op = aes_impl.begin_aead(
        kek,
        aes::GcmMode::GcmTag12 { nonce },
        SymmetricOperation::Encrypt,
    )?;
    op.update_aad(&auth_data)?;
    let mut ct = op.update(&secret)?;
    ct.try_extend_from_slice(&op.finish()?)?;
    if ct.len() < TAG_SIZE {
        return Err(km_err!(UnknownError, "encryption output too short"));
    }
    let split = ct.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&ct[split..]);
    ct.truncate(split);

    Ok(EncryptedKeyBlob {
        secret_ciphertext: ct,
        nonce,
        tag,
        characteristics: plaintext.characteristics,
        public_key,
    })
}

/// Decrypt a key blob, checking that it was bound to the same `hidden`
/// parameters. Every failure along the way, including a blob that fails to
/// parse, surfaces as `ErrorCode::InvalidKeyBlob`.
pub fn decrypt(
    aes_impl: &dyn crypto::Aes,
    hmac_impl: &dyn crypto::Hmac,
    root_key: &aes::Key,
    encrypted: EncryptedKeyBlob,
    hidden: &[KeyParam],
) -> Result<PlaintextKeyBlob, Error> {
    decrypt_inner(aes_impl, hmac_impl, root_key, encrypted, hidden).map_err(|e| {
        warn!("failed to decrypt key blob: {:?}", e);
        km_err!(InvalidKeyBlob, "failed to decrypt key blob")
    })
}

fn decrypt_inner(
    aes_impl: &dyn crypto::Aes,
    hmac_impl: &dyn crypto::Hmac,
    root_key: &aes::Key,
    encrypted: EncryptedKeyBlob,
    hidden: &[KeyParam],
) -> Result<PlaintextKeyBlob, Error> {
    let auth_data =
        build_auth_data(&encrypted.characteristics, hidden, encrypted.public_key.as_ref())?;
    let kek =
        derive_kek(aes_impl, hmac_impl, root_key, &encrypted.nonce, &auth_data, hidden)?;

    let mut op = aes_impl.begin_aead(
        kek,
        aes::GcmMode::GcmTag12 { nonce: encrypted.nonce },
        SymmetricOperation::Decrypt,
    )?;
    op.update_aad(&auth_data)?;
    let mut secret = op.update(&encrypted.secret_ciphertext)?;
    secret.try_extend_from_slice(&op.update(&encrypted.tag)?)?;
    secret.try_extend_from_slice(&op.finish()?)?;

    let key_material = KeyMaterial::from_slice(&secret)?;
    Ok(PlaintextKeyBlob { characteristics: encrypted.characteristics, key_material })
}

/// Parse and decrypt a serialized key blob.
pub fn parse_and_decrypt(
    aes_impl: &dyn crypto::Aes,
    hmac_impl: &dyn crypto::Hmac,
    root_key: &aes::Key,
    blob: &[u8],
    hidden: &[KeyParam],
) -> Result<PlaintextKeyBlob, Error> {
    let encrypted = EncryptedKeyBlob::from_slice(blob)
        .map_err(|_e| km_err!(InvalidKeyBlob, "failed to parse key blob"))?;
    decrypt(aes_impl, hmac_impl, root_key, encrypted, hidden)
}
