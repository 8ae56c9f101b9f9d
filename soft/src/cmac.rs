//! AES-CMAC implementation.

use cmac::{Cmac, Mac};
use kma_common::crypto::{self, aes as km_aes};
use kma_common::{km_err, Error};

/// [`crypto::AesCmac`] implementation based on the RustCrypto crates.
pub struct SoftAesCmac;

impl crypto::AesCmac for SoftAesCmac {
    fn begin(&self, key: km_aes::Key) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        let mac = match &key {
            km_aes::Key::Aes128(k) => CmacVariant::Aes128(
                <Cmac<aes::Aes128> as Mac>::new_from_slice(k)
                    .map_err(|_e| km_err!(UnsupportedKeySize, "CMAC key rejected"))?,
            ),
            km_aes::Key::Aes192(k) => CmacVariant::Aes192(
                <Cmac<aes::Aes192> as Mac>::new_from_slice(k)
                    .map_err(|_e| km_err!(UnsupportedKeySize, "CMAC key rejected"))?,
            ),
            km_aes::Key::Aes256(k) => CmacVariant::Aes256(
                <Cmac<aes::Aes256> as Mac>::new_from_slice(k)
                    .map_err(|_e| km_err!(UnsupportedKeySize, "CMAC key rejected"))?,
            ),
        };
        Ok(Box::new(CmacOperation { mac }))
    }
}

enum CmacVariant {
    Aes128(Cmac<aes::Aes128>),
    Aes192(Cmac<aes::Aes192>),
    Aes256(Cmac<aes::Aes256>),
}

struct CmacOperation {
    mac: CmacVariant,
}

impl crypto::AccumulatingOperation for CmacOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        match &mut self.mac {
            CmacVariant::Aes128(m) => m.update(data),
            CmacVariant::Aes192(m) => m.update(data),
            CmacVariant::Aes256(m) => m.update(data),
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(match self.mac {
            CmacVariant::Aes128(m) => m.finalize().into_bytes().to_vec(),
            CmacVariant::Aes192(m) => m.finalize().into_bytes().to_vec(),
            CmacVariant::Aes256(m) => m.finalize().into_bytes().to_vec(),
        })
    }
}
