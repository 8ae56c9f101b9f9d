//! Triple DES implementation.

use cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use des::TdesEde3;
use kma_common::crypto::{des as km_des, SymmetricOperation};
use kma_common::{crypto, km_err, Error, FallibleAllocExt};

/// [`crypto::Des`] implementation based on the RustCrypto crates.
pub struct SoftDes;

impl crypto::Des for SoftDes {
    fn begin(
        &self,
        key: km_des::Key,
        mode: km_des::Mode,
        dir: SymmetricOperation,
    ) -> Result<Box<dyn crypto::EmittingOperation>, Error> {
        Ok(Box::new(DesOperation { key, mode, dir, data: Vec::new() }))
    }
}

/// A 3-DES operation in progress. Input is accumulated and processed in one
/// go when the operation completes.
struct DesOperation {
    key: km_des::Key,
    mode: km_des::Mode,
    dir: SymmetricOperation,
    data: Vec<u8>,
}

impl crypto::EmittingOperation for DesOperation {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.data.try_extend_from_slice(data)?;
        Ok(Vec::new())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        use km_des::Mode::*;
        let data = &self.data[..];
        let key = &self.key.0[..];
        match self.mode {
            EcbNoPadding | CbcNoPadding { .. } if data.len() % km_des::BLOCK_SIZE != 0 => {
                return Err(km_err!(
                    InvalidInputLength,
                    "input length {} not a block multiple",
                    data.len()
                ));
            }
            _ => {}
        }
        match (self.mode, self.dir) {
            (EcbNoPadding, SymmetricOperation::Encrypt) => {
                Ok(ecb::Encryptor::<TdesEde3>::new_from_slice(key)
                    .map_err(key_len_err)?
                    .encrypt_padded_vec_mut::<NoPadding>(data))
            }
            (EcbNoPadding, SymmetricOperation::Decrypt) => {
                ecb::Decryptor::<TdesEde3>::new_from_slice(key)
                    .map_err(key_len_err)?
                    .decrypt_padded_vec_mut::<NoPadding>(data)
                    .map_err(unpad_err)
            }
            (EcbPkcs7Padding, SymmetricOperation::Encrypt) => {
                Ok(ecb::Encryptor::<TdesEde3>::new_from_slice(key)
                    .map_err(key_len_err)?
                    .encrypt_padded_vec_mut::<Pkcs7>(data))
            }
            (EcbPkcs7Padding, SymmetricOperation::Decrypt) => {
                ecb::Decryptor::<TdesEde3>::new_from_slice(key)
                    .map_err(key_len_err)?
                    .decrypt_padded_vec_mut::<Pkcs7>(data)
                    .map_err(unpad_err)
            }
            (CbcNoPadding { nonce }, SymmetricOperation::Encrypt) => {
                Ok(cbc::Encryptor::<TdesEde3>::new_from_slices(key, &nonce)
                    .map_err(key_len_err)?
                    .encrypt_padded_vec_mut::<NoPadding>(data))
            }
            (CbcNoPadding { nonce }, SymmetricOperation::Decrypt) => {
                cbc::Decryptor::<TdesEde3>::new_from_slices(key, &nonce)
                    .map_err(key_len_err)?
                    .decrypt_padded_vec_mut::<NoPadding>(data)
                    .map_err(unpad_err)
            }
            (CbcPkcs7Padding { nonce }, SymmetricOperation::Encrypt) => {
                Ok(cbc::Encryptor::<TdesEde3>::new_from_slices(key, &nonce)
                    .map_err(key_len_err)?
                    .encrypt_padded_vec_mut::<Pkcs7>(data))
            }
            (CbcPkcs7Padding { nonce }, SymmetricOperation::Decrypt) => {
                cbc::Decryptor::<TdesEde3>::new_from_slices(key, &nonce)
                    .map_err(key_len_err)?
                    .decrypt_padded_vec_mut::<Pkcs7>(data)
                    .map_err(unpad_err)
            }
        }
    }
}

fn key_len_err(_e: cipher::InvalidLength) -> Error {
    km_err!(UnsupportedKeySize, "unexpected key or nonce length")
}

fn unpad_err(_e: cipher::block_padding::UnpadError) -> Error {
    km_err!(InvalidArgument, "padding check failed")
}
