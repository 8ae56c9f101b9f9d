//! AES implementation.

use aes_gcm::aead::{generic_array::GenericArray, Aead, Payload};
use cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher,
};
use kma_common::crypto::{aes as km_aes, SymmetricOperation};
use kma_common::{crypto, km_err, Error, FallibleAllocExt};
use typenum::{U12, U13, U14, U15, U16};

/// [`crypto::Aes`] implementation based on the RustCrypto crates.
pub struct SoftAes;

impl crypto::Aes for SoftAes {
    fn begin(
        &self,
        key: km_aes::Key,
        mode: km_aes::CipherMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn crypto::EmittingOperation>, Error> {
        Ok(Box::new(CipherOperation { key, mode, dir, data: Vec::new() }))
    }

    fn begin_aead(
        &self,
        key: km_aes::Key,
        mode: km_aes::GcmMode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn crypto::AadOperation>, Error> {
        Ok(Box::new(GcmOperation { key, mode, dir, aad: Vec::new(), data: Vec::new() }))
    }
}

/// A non-AEAD operation in progress. Input is accumulated and processed in
/// one go when the operation completes.
struct CipherOperation {
    key: km_aes::Key,
    mode: km_aes::CipherMode,
    dir: SymmetricOperation,
    data: Vec<u8>,
}

impl crypto::EmittingOperation for CipherOperation {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.data.try_extend_from_slice(data)?;
        Ok(Vec::new())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        use km_aes::CipherMode::*;
        let data = &self.data[..];
        match self.mode {
            EcbNoPadding | CbcNoPadding { .. } if data.len() % km_aes::BLOCK_SIZE != 0 => {
                return Err(km_err!(
                    InvalidInputLength,
                    "input length {} not a block multiple",
                    data.len()
                ));
            }
            _ => {}
        }

        macro_rules! cipher_op {
            { $cipher:ty, $key:expr } => {
                match (self.mode, self.dir) {
                    (EcbNoPadding, SymmetricOperation::Encrypt) => {
                        Ok(ecb::Encryptor::<$cipher>::new_from_slice($key)
                            .map_err(key_len_err)?
                            .encrypt_padded_vec_mut::<NoPadding>(data))
                    }
                    (EcbNoPadding, SymmetricOperation::Decrypt) => {
                        ecb::Decryptor::<$cipher>::new_from_slice($key)
                            .map_err(key_len_err)?
                            .decrypt_padded_vec_mut::<NoPadding>(data)
                            .map_err(unpad_err)
                    }
                    (EcbPkcs7Padding, SymmetricOperation::Encrypt) => {
                        Ok(ecb::Encryptor::<$cipher>::new_from_slice($key)
                            .map_err(key_len_err)?
                            .encrypt_padded_vec_mut::<Pkcs7>(data))
                    }
                    (EcbPkcs7Padding, SymmetricOperation::Decrypt) => {
                        ecb::Decryptor::<$cipher>::new_from_slice($key)
                            .map_err(key_len_err)?
                            .decrypt_padded_vec_mut::<Pkcs7>(data)
                            .map_err(unpad_err)
                    }
                    (CbcNoPadding { nonce }, SymmetricOperation::Encrypt) => {
                        Ok(cbc::Encryptor::<$cipher>::new_from_slices($key, &nonce)
                            .map_err(key_len_err)?
                            .encrypt_padded_vec_mut::<NoPadding>(data))
                    }
                    (CbcNoPadding { nonce }, SymmetricOperation::Decrypt) => {
                        cbc::Decryptor::<$cipher>::new_from_slices($key, &nonce)
                            .map_err(key_len_err)?
                            .decrypt_padded_vec_mut::<NoPadding>(data)
                            .map_err(unpad_err)
                    }
                    (CbcPkcs7Padding { nonce }, SymmetricOperation::Encrypt) => {
                        Ok(cbc::Encryptor::<$cipher>::new_from_slices($key, &nonce)
                            .map_err(key_len_err)?
                            .encrypt_padded_vec_mut::<Pkcs7>(data))
                    }
                    (CbcPkcs7Padding { nonce }, SymmetricOperation::Decrypt) => {
                        cbc::Decryptor::<$cipher>::new_from_slices($key, &nonce)
                            .map_err(key_len_err)?
                            .decrypt_padded_vec_mut::<Pkcs7>(data)
                            .map_err(unpad_err)
                    }
                    (Ctr { nonce }, _) => {
                        let mut cipher =
                            ctr::Ctr128BE::<$cipher>::new_from_slices($key, &nonce)
                                .map_err(key_len_err)?;
                        let mut buf = data.to_vec();
                        cipher.apply_keystream(&mut buf);
                        Ok(buf)
                    }
                }
            };
        }

        match &self.key {
            km_aes::Key::Aes128(k) => cipher_op!(aes::Aes128, k),
            km_aes::Key::Aes192(k) => cipher_op!(aes::Aes192, k),
            km_aes::Key::Aes256(k) => cipher_op!(aes::Aes256, k),
        }
    }
}

/// An AES-GCM operation in progress. Both AAD and input are accumulated and
/// processed when the operation completes; for decryption the final
/// `TAG_SIZE` bytes of input are the tag to verify.
struct GcmOperation {
    key: km_aes::Key,
    mode: km_aes::GcmMode,
    dir: SymmetricOperation,
    aad: Vec<u8>,
    data: Vec<u8>,
}

impl crypto::EmittingOperation for GcmOperation {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.data.try_extend_from_slice(data)?;
        Ok(Vec::new())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        use km_aes::GcmMode::*;

        macro_rules! gcm_op {
            { $cipher:ty, $tag_size:ty, $key:expr, $nonce:expr } => {{
                let cipher = aes_gcm::AesGcm::<$cipher, U12, $tag_size>::new_from_slice($key)
                    .map_err(key_len_err)?;
                let nonce = GenericArray::from_slice($nonce);
                let payload = Payload { msg: &self.data, aad: &self.aad };
                match self.dir {
                    SymmetricOperation::Encrypt => cipher
                        .encrypt(nonce, payload)
                        .map_err(|_e| km_err!(UnknownError, "AES-GCM encryption failed")),
                    SymmetricOperation::Decrypt => cipher
                        .decrypt(nonce, payload)
                        .map_err(|_e| km_err!(VerificationFailed, "AES-GCM tag mismatch")),
                }
            }};
        }

        macro_rules! gcm_op_key {
            { $tag_size:ty, $nonce:expr } => {
                match &self.key {
                    km_aes::Key::Aes128(k) => gcm_op!(aes::Aes128, $tag_size, k, $nonce),
                    km_aes::Key::Aes192(k) => gcm_op!(aes::Aes192, $tag_size, k, $nonce),
                    km_aes::Key::Aes256(k) => gcm_op!(aes::Aes256, $tag_size, k, $nonce),
                }
            };
        }

        match self.mode {
            GcmTag12 { nonce } => gcm_op_key!(U12, &nonce),
            GcmTag13 { nonce } => gcm_op_key!(U13, &nonce),
            GcmTag14 { nonce } => gcm_op_key!(U14, &nonce),
            GcmTag15 { nonce } => gcm_op_key!(U15, &nonce),
            GcmTag16 { nonce } => gcm_op_key!(U16, &nonce),
        }
    }
}

impl crypto::AadOperation for GcmOperation {
    fn update_aad(&mut self, aad: &[u8]) -> Result<(), Error> {
        if !self.data.is_empty() {
            return Err(km_err!(InvalidTag, "AAD provided after data"));
        }
        self.aad.try_extend_from_slice(aad)?;
        Ok(())
    }
}

fn key_len_err(_e: cipher::InvalidLength) -> Error {
    km_err!(UnsupportedKeySize, "unexpected key or nonce length")
}

fn unpad_err(_e: cipher::block_padding::UnpadError) -> Error {
    km_err!(InvalidArgument, "padding check failed")
}
