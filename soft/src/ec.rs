//! EC implementation. Only the P-256 curve is supported.

use kma_common::crypto::{self, ec as km_ec, KeyMaterial};
use kma_common::{km_err, Error};
use kma_wire::keymaster::{Digest, EcCurve};
use kma_wire::KeySizeInBits;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use p256::SecretKey;
use rand_core::OsRng;

/// [`crypto::Ec`] implementation based on the `p256` crate. Key material is
/// the raw 32-byte private scalar.
pub struct SoftEc;

fn check_curve(curve: EcCurve) -> Result<(), Error> {
    if curve != EcCurve::P256 {
        return Err(km_err!(UnsupportedEcCurve, "EC curve {:?} not supported", curve));
    }
    Ok(())
}

fn parse_key(key: &km_ec::Key) -> Result<SecretKey, Error> {
    SecretKey::from_slice(&key.0).map_err(|_e| km_err!(InvalidKeyBlob, "failed to parse EC key"))
}

impl crypto::Ec for SoftEc {
    fn generate_key(&self, _rng: &mut dyn crypto::Rng, curve: EcCurve) -> Result<KeyMaterial, Error> {
        check_curve(curve)?;
        let key = SecretKey::random(&mut OsRng);
        Ok(KeyMaterial::Ec(curve, km_ec::Key(key.to_bytes().to_vec())))
    }

    fn import_raw_key(
        &self,
        curve: EcCurve,
        priv_scalar: &[u8],
        pub_point: &[u8],
    ) -> Result<(KeyMaterial, KeySizeInBits), Error> {
        check_curve(curve)?;
        let key = SecretKey::from_slice(priv_scalar)
            .map_err(|_e| km_err!(InvalidArgument, "invalid EC private scalar"))?;
        let computed = key.public_key().to_sec1_bytes();
        if computed.as_ref() != pub_point {
            return Err(km_err!(
                ImportParameterMismatch,
                "public point does not match private scalar"
            ));
        }
        Ok((
            KeyMaterial::Ec(curve, km_ec::Key(key.to_bytes().to_vec())),
            km_ec::curve_to_key_size(curve),
        ))
    }

    fn subject_public_key(&self, curve: EcCurve, key: &km_ec::Key) -> Result<Vec<u8>, Error> {
        check_curve(curve)?;
        let key = parse_key(key)?;
        let spki = key
            .public_key()
            .to_public_key_der()
            .map_err(|_e| km_err!(UnknownError, "EC public key encoding failed"))?;
        Ok(spki.as_bytes().to_vec())
    }

    fn begin_sign(
        &self,
        curve: EcCurve,
        key: km_ec::Key,
        digest: Digest,
    ) -> Result<Box<dyn crypto::AccumulatingOperation>, Error> {
        check_curve(curve)?;
        if digest != Digest::Sha256 {
            return Err(km_err!(
                UnsupportedDigest,
                "digest {:?} not supported for ECDSA",
                digest
            ));
        }
        let key = parse_key(&key)?;
        Ok(Box::new(EcSignOperation { key: SigningKey::from(key), data: Vec::new() }))
    }
}

struct EcSignOperation {
    key: SigningKey,
    data: Vec<u8>,
}

impl crypto::AccumulatingOperation for EcSignOperation {
    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        use kma_common::FallibleAllocExt;
        self.data.try_extend_from_slice(data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, Error> {
        let signature: Signature = self.key.sign(&self.data);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
