//! HMAC implementation.

use hmac::{Hmac, Mac};
use kma_common::crypto::{self, hmac as km_hmac};
use kma_common::{km_err, Error};
use kma_wire::keymaster::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

/// [`crypto::Hmac`] implementation based on the RustCrypto crates.
pub struct SoftHmac;

impl crypto::Hmac for SoftHmac {
    fn begin(
        &self,
        key: km_hmac::Key,
        digest: Digest,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        macro_rules! init {
            { $variant:ident, $digest:ty } => {
                HmacVariant::$variant(
                    <Hmac<$digest> as Mac>::new_from_slice(&key.0)
                        .map_err(|_e| km_err!(UnsupportedKeySize, "HMAC key rejected"))?,
                )
            };
        }
        let mac = match digest {
            Digest::Md5 => init!(Md5, Md5),
            Digest::Sha1 => init!(Sha1, Sha1),
            Digest::Sha224 => init!(Sha224, Sha224),
            Digest::Sha256 => init!(Sha256, Sha256),
            Digest::Sha384 => init!(Sha384, Sha384),
            Digest::Sha512 => init!(Sha512, Sha512),
            Digest::None => {
                return Err(km_err!(UnsupportedDigest, "HMAC requires a digest"));
            }
        };
        Ok(Box::new(HmacOperation { mac }))
    }
}

enum HmacVariant {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

struct HmacOperation {
    mac: HmacVariant,
}

impl crypto::AccumulatingOperation for HmacOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        match &mut self.mac {
            HmacVariant::Md5(m) => m.update(data),
            HmacVariant::Sha1(m) => m.update(data),
            HmacVariant::Sha224(m) => m.update(data),
            HmacVariant::Sha256(m) => m.update(data),
            HmacVariant::Sha384(m) => m.update(data),
            HmacVariant::Sha512(m) => m.update(data),
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        Ok(match self.mac {
            HmacVariant::Md5(m) => m.finalize().into_bytes().to_vec(),
            HmacVariant::Sha1(m) => m.finalize().into_bytes().to_vec(),
            HmacVariant::Sha224(m) => m.finalize().into_bytes().to_vec(),
            HmacVariant::Sha256(m) => m.finalize().into_bytes().to_vec(),
            HmacVariant::Sha384(m) => m.finalize().into_bytes().to_vec(),
            HmacVariant::Sha512(m) => m.finalize().into_bytes().to_vec(),
        })
    }
}
