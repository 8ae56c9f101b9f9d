//! Traits that abstract the cryptographic functionality the applet relies on,
//! so different hardware backends can be slotted in underneath.

use super::{aes, des, ec, hmac, rsa, KeyMaterial, MillisecondsSinceEpoch, SymmetricOperation};
use crate::Error;
use alloc::boxed::Box;
use alloc::vec::Vec;
use kma_wire::keymaster::{Digest, EcCurve, KeyParam};
use kma_wire::{KeySizeInBits, RsaExponent};
use log::error;

/// Combined collection of trait implementations that must be provided.
pub struct Implementation {
    /// Random number generator.
    pub rng: Box<dyn Rng>,
    /// A constant-time equality implementation.
    pub verify: Box<dyn ConstTimeEq>,
    /// AES implementation.
    pub aes: Box<dyn Aes>,
    /// 3-DES implementation.
    pub des: Box<dyn Des>,
    /// HMAC implementation.
    pub hmac: Box<dyn Hmac>,
    /// AES-CMAC implementation, also used for the shared-secret KDF.
    pub cmac: Box<dyn AesCmac>,
    /// RSA implementation.
    pub rsa: Box<dyn Rsa>,
    /// EC implementation.
    pub ec: Box<dyn Ec>,
    /// Monotonic clock, if the hardware has one.
    pub clock: Option<Box<dyn MonotonicClock>>,
}

/// Abstraction of a random number generator that is cryptographically secure
/// and which accepts additional entropy to be mixed in.
pub trait Rng: Send {
    /// Add entropy to the generator's pool.
    fn add_entropy(&mut self, data: &[u8]);
    /// Generate random data.
    fn fill_bytes(&mut self, dest: &mut [u8]);
    /// Return a random `u64` value.
    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}

/// Abstraction of constant-time comparisons, for use in cryptographic contexts
/// where timing attacks need to be avoided.
pub trait ConstTimeEq: Send {
    /// Indicate whether arguments are the same.
    fn eq(&self, left: &[u8], right: &[u8]) -> bool;
    /// Indicate whether arguments are not the same.
    fn ne(&self, left: &[u8], right: &[u8]) -> bool {
        !self.eq(left, right)
    }
}

/// Abstraction of a monotonic clock.
pub trait MonotonicClock: Send {
    /// Current time since an epoch that does not change while the device is
    /// powered. Must never go backwards.
    fn now(&self) -> MillisecondsSinceEpoch;
}

/// Abstraction of AES functionality.
pub trait Aes: Send {
    /// Generate an AES key. The default implementation fills `variant`-many
    /// random bytes; replace it if the hardware keeps key material opaque.
    fn generate_key(&self, rng: &mut dyn Rng, variant: aes::Variant) -> Result<KeyMaterial, Error> {
        Ok(match variant {
            aes::Variant::Aes128 => {
                let mut key = [0u8; 16];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes128(key))
            }
            aes::Variant::Aes192 => {
                let mut key = [0u8; 24];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes192(key))
            }
            aes::Variant::Aes256 => {
                let mut key = [0u8; 32];
                rng.fill_bytes(&mut key[..]);
                KeyMaterial::Aes(aes::Key::Aes256(key))
            }
        })
    }

    /// Import an AES key, also returning the key size in bits.
    fn import_key(&self, data: &[u8]) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        let aes_key = aes::Key::new_from(data)?;
        let key_size = aes_key.size();
        Ok((KeyMaterial::Aes(aes_key), key_size))
    }

    /// Create an AES operation for the given direction in a non-AEAD mode.
    fn begin(
        &self,
        key: aes::Key,
        mode: aes::CipherMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn EmittingOperation>, Error>;

    /// Create an AES-GCM operation for the given direction.
    fn begin_aead(
        &self,
        key: aes::Key,
        mode: aes::GcmMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn AadOperation>, Error>;
}

/// Abstraction of 3-DES functionality.
pub trait Des: Send {
    /// Generate a triple DES key. Parity bits are not adjusted; they do not
    /// affect the cryptographic operation.
    fn generate_key(&self, rng: &mut dyn Rng) -> Result<KeyMaterial, Error> {
        let mut key = alloc::vec![0u8; 24];
        rng.fill_bytes(&mut key);
        Ok(KeyMaterial::TripleDes(des::Key::new(key)?))
    }

    /// Import a triple DES key.
    fn import_key(&self, data: &[u8]) -> Result<KeyMaterial, Error> {
        let des_key = des::Key::new_from(data)?;
        Ok(KeyMaterial::TripleDes(des_key))
    }

    /// Create a DES operation for the given direction.
    fn begin(
        &self,
        key: des::Key,
        mode: des::Mode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn EmittingOperation>, Error>;
}

/// Abstraction of HMAC functionality.
pub trait Hmac: Send {
    /// Generate an HMAC key of the given size.
    fn generate_key(
        &self,
        rng: &mut dyn Rng,
        key_size: KeySizeInBits,
    ) -> Result<KeyMaterial, Error> {
        hmac::valid_hal_size(key_size)?;
        let key_len = (key_size.0 / 8) as usize;
        let mut key = alloc::vec![0u8; key_len];
        rng.fill_bytes(&mut key);
        Ok(KeyMaterial::Hmac(hmac::Key(key)))
    }

    /// Import an HMAC key, also returning the key size in bits.
    fn import_key(&self, data: &[u8]) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        let hmac_key = hmac::Key::new_from(data)?;
        let key_size = hmac_key.size();
        hmac::valid_hal_size(key_size)?;
        Ok((KeyMaterial::Hmac(hmac_key), key_size))
    }

    /// Create an HMAC operation. Implementations can assume that the size of
    /// `key` is at least 8 bytes.
    fn begin(&self, key: hmac::Key, digest: Digest)
        -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Abstraction of AES-CMAC functionality.
pub trait AesCmac: Send {
    /// Create an AES-CMAC operation. Implementations can assume that the
    /// `key` is 16 or 32 bytes.
    fn begin(&self, key: aes::Key) -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Key derivation from NIST SP 800-108 in counter mode using AES-CMAC as the
/// PRF. Implemented automatically for every [`AesCmac`] implementation.
pub trait Ckdf: Send {
    fn ckdf(
        &self,
        key: &aes::Key,
        label: &[u8],
        chunks: &[&[u8]],
        out_len: usize,
    ) -> Result<Vec<u8>, Error>;
}

/// Abstraction of RSA functionality.
pub trait Rsa: Send {
    /// Generate an RSA key pair with the given size and public exponent.
    fn generate_key(
        &self,
        rng: &mut dyn Rng,
        key_size: KeySizeInBits,
        pub_exponent: RsaExponent,
        params: &[KeyParam],
    ) -> Result<KeyMaterial, Error>;

    /// Import an RSA key from its private exponent and modulus, also returning
    /// the key size in bits. The public exponent is assumed to be 65537.
    fn import_raw_key(
        &self,
        priv_exponent: &[u8],
        modulus: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error>;

    /// Return the `SubjectPublicKeyInfo` encoding of the public key for the
    /// given key pair.
    fn subject_public_key(&self, key: &rsa::Key) -> Result<Vec<u8>, Error>;

    /// Create an RSA decryption operation.
    fn begin_decrypt(
        &self,
        key: rsa::Key,
        mode: rsa::DecryptionMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;

    /// Create an RSA signing operation.
    fn begin_sign(
        &self,
        key: rsa::Key,
        mode: rsa::SignMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Abstraction of EC functionality.
pub trait Ec: Send {
    /// Generate an EC key for a NIST curve.
    fn generate_key(&self, rng: &mut dyn Rng, curve: EcCurve) -> Result<KeyMaterial, Error>;

    /// Import an EC key from its private scalar and (uncompressed) public
    /// point, also returning the key size in bits.
    fn import_raw_key(
        &self,
        curve: EcCurve,
        priv_scalar: &[u8],
        pub_point: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error>;

    /// Return the `SubjectPublicKeyInfo` encoding of the public key for the
    /// given key pair.
    fn subject_public_key(&self, curve: EcCurve, key: &ec::Key) -> Result<Vec<u8>, Error>;

    /// Create an EC signing operation.
    fn begin_sign(
        &self,
        curve: EcCurve,
        key: ec::Key,
        digest: Digest,
    ) -> Result<Box<dyn AccumulatingOperation>, Error>;
}

/// Abstraction of an in-progress operation that emits data as it progresses.
pub trait EmittingOperation {
    /// Update operation with data.
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error>;

    /// Complete operation, consuming `self`.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// Abstraction of an in-progress AEAD operation.
pub trait AadOperation: EmittingOperation {
    /// Update additional data. Implementations can assume that all calls to
    /// `update_aad()` precede any calls to `update()`.
    fn update_aad(&mut self, aad: &[u8]) -> Result<(), Error>;
}

/// Abstraction of an in-progress operation that accumulates data internally.
pub trait AccumulatingOperation {
    /// Maximum size of accumulated input.
    fn max_input_size(&self) -> Option<usize> {
        None
    }

    /// Update operation with data.
    fn update(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Complete operation, consuming `self`.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error>;
}

/// Mark a branch of code as unimplemented, logging the fact.
#[macro_export]
macro_rules! log_unimpl {
    () => {
        error!("{}:{}: Unimplemented", file!(), line!());
    };
}

/// Mark a code path as unimplemented, returning an `Unimplemented` error.
#[macro_export]
macro_rules! unimpl {
    () => {
        log_unimpl!();
        return Err($crate::km_err!(Unimplemented, "unimplemented"));
    };
}

/// Stub implementation of [`Aes`].
pub struct NoOpAes;
impl Aes for NoOpAes {
    fn begin(
        &self,
        _key: aes::Key,
        _mode: aes::CipherMode,
        _dir: SymmetricOperation,
    ) -> Result<Box<dyn EmittingOperation>, Error> {
        unimpl!();
    }
    fn begin_aead(
        &self,
        _key: aes::Key,
        _mode: aes::GcmMode,
        _dir: SymmetricOperation,
    ) -> Result<Box<dyn AadOperation>, Error> {
        unimpl!();
    }
}

/// Stub implementation of [`Des`].
pub struct NoOpDes;
impl Des for NoOpDes {
    fn begin(
        &self,
        _key: des::Key,
        _mode: des::Mode,
        _dir: SymmetricOperation,
    ) -> Result<Box<dyn EmittingOperation>, Error> {
        unimpl!();
    }
}

/// Stub implementation of [`Hmac`].
pub struct NoOpHmac;
impl Hmac for NoOpHmac {
    fn begin(
        &self,
        _key: hmac::Key,
        _digest: Digest,
    ) -> Result<Box<dyn AccumulatingOperation>, Error> {
        unimpl!();
    }
}

/// Stub implementation of [`AesCmac`].
pub struct NoOpAesCmac;
impl AesCmac for NoOpAesCmac {
    fn begin(&self, _key: aes::Key) -> Result<Box<dyn AccumulatingOperation>, Error> {
        unimpl!();
    }
}

/// Stub implementation of [`Rsa`].
pub struct NoOpRsa;
impl Rsa for NoOpRsa {
    fn generate_key(
        &self,
        _rng: &mut dyn Rng,
        _key_size: KeySizeInBits,
        _pub_exponent: RsaExponent,
        _params: &[KeyParam],
    ) -> Result<KeyMaterial, Error> {
        unimpl!();
    }
    fn import_raw_key(
        &self,
        _priv_exponent: &[u8],
        _modulus: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        unimpl!();
    }
    fn subject_public_key(&self, _key: &rsa::Key) -> Result<Vec<u8>, Error> {
        unimpl!();
    }
    fn begin_decrypt(
        &self,
        _key: rsa::Key,
        _mode: rsa::DecryptionMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error> {
        unimpl!();
    }
    fn begin_sign(
        &self,
        _key: rsa::Key,
        _mode: rsa::SignMode,
    ) -> Result<Box<dyn AccumulatingOperation>, Error> {
        unimpl!();
    }
}

/// Stub implementation of [`Ec`].
pub struct NoOpEc;
impl Ec for NoOpEc {
    fn generate_key(&self, _rng: &mut dyn Rng, _curve: EcCurve) -> Result<KeyMaterial, Error> {
        unimpl!();
    }
    fn import_raw_key(
        &self,
        _curve: EcCurve,
        _priv_scalar: &[u8],
        _pub_point: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        unimpl!();
    }
    fn subject_public_key(&self, _curve: EcCurve, _key: &ec::Key) -> Result<Vec<u8>, Error> {
        unimpl!();
    }
    fn begin_sign(
        &self,
        _curve: EcCurve,
        _key: ec::Key,
        _digest: Digest,
    ) -> Result<Box<dyn AccumulatingOperation>, Error> {
        unimpl!();
    }
}
