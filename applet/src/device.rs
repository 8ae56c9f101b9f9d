//! Abstractions for the device-specific functionality the applet relies on.

use crate::attest::CertificateInfo;
use alloc::boxed::Box;
use alloc::vec::Vec;
use kma_common::crypto::aes;
use kma_common::Error;

/// Combined collection of device trait implementations.
pub struct Implementation {
    /// Retrieval of device-bound key material.
    pub keys: Box<dyn RetrieveKeyMaterial>,
    /// Assembly of attestation certificates.
    pub cert: Box<dyn CertAssembler>,
}

/// Retrieval of device-bound key material. These keys never leave the secure
/// environment and survive across boots.
pub trait RetrieveKeyMaterial {
    /// Root key-encryption key used to derive the per-blob wrapping keys.
    fn root_kek(&self) -> Result<aes::Key, Error>;

    /// Hardware-backed secret used when deriving `UNIQUE_ID` values, never
    /// exposed outside the secure environment.
    fn unique_id_hbk(&self) -> Result<Vec<u8>, Error>;
}

/// Signer callback handed to [`CertAssembler::assemble`]; signs the
/// to-be-signed certificate with the provisioned attestation key.
pub type TbsSigner<'a> = dyn FnMut(&[u8]) -> Result<Vec<u8>, Error> + 'a;

/// Assembly of an attestation certificate from its constituent parts. The
/// DER layout of the certificate lives behind this trait, outside the applet
/// core.
pub trait CertAssembler {
    /// Build a certificate holding `spki` as the subject public key and the
    /// attestation contents of `info`, signed via `signer`.
    fn assemble(
        &self,
        info: &CertificateInfo,
        spki: &[u8],
        signer: &mut TbsSigner,
    ) -> Result<Vec<u8>, Error>;
}
