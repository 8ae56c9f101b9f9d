//! RSA implementation.

use kma_common::crypto::{self, rsa as km_rsa, KeyMaterial};
use kma_common::{km_err, Error};
use kma_wire::keymaster::Digest;
use kma_wire::{KeySizeInBits, RsaExponent};
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Digest as _, Sha224, Sha256, Sha384, Sha512};

/// [`crypto::Rsa`] implementation based on the `rsa` crate. Key material is
/// held as the PKCS#1 DER encoding of the private key.
pub struct SoftRsa;

fn parse_key(key: &km_rsa::Key) -> Result<RsaPrivateKey, Error> {
    RsaPrivateKey::from_pkcs1_der(&key.0)
        .map_err(|_e| km_err!(InvalidKeyBlob, "failed to parse RSA key"))
}

impl crypto::Rsa for SoftRsa {
    fn generate_key(
        &self,
        _rng: &mut dyn crypto::Rng,
        key_size: KeySizeInBits,
        pub_exponent: RsaExponent,
        _params: &[kma_wire::keymaster::KeyParam],
    ) -> Result<KeyMaterial, Error> {
        let key = RsaPrivateKey::new_with_exp(
            &mut OsRng,
            key_size.0 as usize,
            &BigUint::from(pub_exponent.0),
        )
        .map_err(|_e| km_err!(UnknownError, "RSA key generation failed"))?;
        let der = key
            .to_pkcs1_der()
            .map_err(|_e| km_err!(UnknownError, "RSA key encoding failed"))?;
        Ok(KeyMaterial::Rsa(km_rsa::Key(der.as_bytes().to_vec())))
    }

    fn import_raw_key(
        &self,
        priv_exponent: &[u8],
        modulus: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        let n = BigUint::from_bytes_be(modulus);
        let d = BigUint::from_bytes_be(priv_exponent);
        let e = BigUint::from(km_rsa::REQUIRED_EXPONENT);
        let key = RsaPrivateKey::from_components(n, e, d, Vec::new())
            .map_err(|_e| km_err!(InvalidArgument, "invalid RSA key components"))?;
        let key_size = KeySizeInBits((key.size() * 8) as u32);
        let der = key
            .to_pkcs1_der()
            .map_err(|_e| km_err!(UnknownError, "RSA key encoding failed"))?;
        Ok((KeyMaterial::Rsa(km_rsa::Key(der.as_bytes().to_vec())), key_size))
    }

    fn subject_public_key(&self, key: &km_rsa::Key) -> Result<Vec<u8>, Error> {
        let key = parse_key(key)?;
        let spki = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|_e| km_err!(UnknownError, "RSA public key encoding failed"))?;
        Ok(spki.as_bytes().to_vec())
    }

    fn begin_decrypt(
        &self,
        key: km_rsa::Key,
        mode: km_rsa::DecryptionMode,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let key = parse_key(&key)?;
        Ok(Box::new(RsaDecryptOperation { key, mode, data: Vec::new() }))
    }

    fn begin_sign(
        &self,
        key: km_rsa::Key,
        mode: km_rsa::SignMode,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let key = parse_key(&key)?;
        Ok(Box::new(RsaSignOperation { key, mode, data: Vec::new() }))
    }
}

struct RsaDecryptOperation {
    key: RsaPrivateKey,
    mode: km_rsa::DecryptionMode,
    data: Vec<u8>,
}

impl crypto::AccumulatingOperation for RsaDecryptOperation {
    fn max_input_size(&self) -> Option<usize> {
        Some(self.key.size())
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        use kma_common::FallibleAllocExt;
        self.data.try_extend_from_slice(data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        match self.mode {
            km_rsa::DecryptionMode::NoPadding => raw_op(&self.key, &self.data),
            km_rsa::DecryptionMode::Pkcs1_1_5Padding => self
                .key
                .decrypt(Pkcs1v15Encrypt, &self.data)
                .map_err(|_e| km_err!(UnknownError, "RSA PKCS#1 v1.5 decryption failed")),
            km_rsa::DecryptionMode::OaepPadding { msg_digest } => {
                let padding = match msg_digest {
                    Digest::Sha1 => Oaep::new::<Sha1>(),
                    Digest::Sha224 => Oaep::new_with_mgf_hash::<Sha224, Sha1>(),
                    Digest::Sha256 => Oaep::new_with_mgf_hash::<Sha256, Sha1>(),
                    Digest::Sha384 => Oaep::new_with_mgf_hash::<Sha384, Sha1>(),
                    Digest::Sha512 => Oaep::new_with_mgf_hash::<Sha512, Sha1>(),
                    d => {
                        return Err(km_err!(
                            UnsupportedDigest,
                            "digest {:?} not supported for RSA-OAEP",
                            d
                        ))
                    }
                };
                self.key
                    .decrypt(padding, &self.data)
                    .map_err(|_e| km_err!(UnknownError, "RSA-OAEP decryption failed"))
            }
        }
    }
}

struct RsaSignOperation {
    key: RsaPrivateKey,
    mode: km_rsa::SignMode,
    data: Vec<u8>,
}

impl crypto::AccumulatingOperation for RsaSignOperation {
    fn max_input_size(&self) -> Option<usize> {
        match self.mode {
            km_rsa::SignMode::NoPadding => Some(self.key.size()),
            // Unprefixed PKCS#1 v1.5 signs the input directly, so it must fit
            // inside the padding.
            km_rsa::SignMode::Pkcs1_1_5Padding(Digest::None) => Some(self.key.size() - 11),
            _ => None,
        }
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        use kma_common::FallibleAllocExt;
        self.data.try_extend_from_slice(data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        match self.mode {
            km_rsa::SignMode::NoPadding => raw_op(&self.key, &self.data),
            km_rsa::SignMode::Pkcs1_1_5Padding(Digest::None) => self
                .key
                .sign(Pkcs1v15Sign::new_unprefixed(), &self.data)
                .map_err(|_e| km_err!(UnknownError, "RSA raw PKCS#1 v1.5 signing failed")),
            km_rsa::SignMode::Pkcs1_1_5Padding(digest) => {
                let (padding, hashed) = match digest {
                    Digest::Sha1 => (Pkcs1v15Sign::new::<Sha1>(), Sha1::digest(&self.data).to_vec()),
                    Digest::Sha224 => {
                        (Pkcs1v15Sign::new::<Sha224>(), Sha224::digest(&self.data).to_vec())
                    }
                    Digest::Sha256 => {
                        (Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(&self.data).to_vec())
                    }
                    Digest::Sha384 => {
                        (Pkcs1v15Sign::new::<Sha384>(), Sha384::digest(&self.data).to_vec())
                    }
                    Digest::Sha512 => {
                        (Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(&self.data).to_vec())
                    }
                    d => {
                        return Err(km_err!(
                            UnsupportedDigest,
                            "digest {:?} not supported for RSA signing",
                            d
                        ))
                    }
                };
                self.key
                    .sign(padding, &hashed)
                    .map_err(|_e| km_err!(UnknownError, "RSA PKCS#1 v1.5 signing failed"))
            }
            km_rsa::SignMode::Pss(digest) => {
                let (padding, hashed) = match digest {
                    Digest::Sha1 => (Pss::new::<Sha1>(), Sha1::digest(&self.data).to_vec()),
                    Digest::Sha224 => (Pss::new::<Sha224>(), Sha224::digest(&self.data).to_vec()),
                    Digest::Sha256 => (Pss::new::<Sha256>(), Sha256::digest(&self.data).to_vec()),
                    Digest::Sha384 => (Pss::new::<Sha384>(), Sha384::digest(&self.data).to_vec()),
                    Digest::Sha512 => (Pss::new::<Sha512>(), Sha512::digest(&self.data).to_vec()),
                    d => {
                        return Err(km_err!(
                            UnsupportedDigest,
                            "digest {:?} not supported for RSA-PSS",
                            d
                        ))
                    }
                };
                self.key
                    .sign_with_rng(&mut OsRng, padding, &hashed)
                    .map_err(|_e| km_err!(UnknownError, "RSA-PSS signing failed"))
            }
        }
    }
}

/// Raw RSA private-key operation: interpret the input as a big-endian integer
/// the size of the modulus and exponentiate with the private exponent.
fn raw_op(key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    let k = key.size();
    if data.len() > k {
        return Err(km_err!(InvalidInputLength, "input longer than RSA modulus"));
    }
    let m = BigUint::from_bytes_be(data);
    if &m >= key.n() {
        return Err(km_err!(InvalidArgument, "input value exceeds RSA modulus"));
    }
    let result = rsa::hazmat::rsa_decrypt_and_check(key, Some(&mut OsRng), &m)
        .map_err(|_e| km_err!(UnknownError, "raw RSA operation failed"))?;
    let bytes = result.to_bytes_be();
    let mut out = vec![0u8; k - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}
