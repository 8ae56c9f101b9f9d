//! Provisioning-phase command handling: attestation key material, certificate
//! chain and signing parameters, attestation identifiers, the pre-shared
//! secret, and boot parameters.

use crate::KeymasterApplet;
use alloc::vec::Vec;
use kma_common::crypto::KeyMaterial;
use kma_common::{km_err, tag, try_to_vec, vec_try_with_capacity, Error, FallibleAllocExt};
use kma_wire::keymaster::{Algorithm, KeyFormat, KeyParam, VerifiedBootState};
use kma_wire::types::{
    GetProvisionStatusResponse, ProvisionAttestationCertChainRequest,
    ProvisionAttestationCertParamsRequest, ProvisionAttestationIdsRequest,
    ProvisionAttestationKeyRequest, ProvisionSharedSecretRequest, SetBootParamsRequest,
};
use kma_wire::{cbor, AsCborValue};
use log::info;

/// Attestation key material has been provisioned.
pub const PROVISION_STATUS_ATTESTATION_KEY: u32 = 0x01;
/// Attestation certificate chain has been provisioned.
pub const PROVISION_STATUS_ATTESTATION_CERT_CHAIN: u32 = 0x02;
/// Attestation certificate signing parameters have been provisioned.
pub const PROVISION_STATUS_ATTESTATION_CERT_PARAMS: u32 = 0x04;
/// Attestation identifiers have been provisioned.
pub const PROVISION_STATUS_ATTEST_IDS: u32 = 0x08;
/// Pre-shared secret has been provisioned.
pub const PROVISION_STATUS_PRESHARED_SECRET: u32 = 0x10;
/// Boot parameters have been received.
pub const PROVISION_STATUS_BOOT_PARAMS: u32 = 0x20;
/// Provisioning is complete and locked.
pub const PROVISION_STATUS_PROVISIONING_LOCKED: u32 = 0x40;

/// Provisioning bits that must all be set before provisioning can be locked.
const LOCK_REQUIRED: u32 = PROVISION_STATUS_ATTESTATION_KEY
    | PROVISION_STATUS_ATTESTATION_CERT_CHAIN
    | PROVISION_STATUS_ATTESTATION_CERT_PARAMS
    | PROVISION_STATUS_PRESHARED_SECRET
    | PROVISION_STATUS_BOOT_PARAMS;

/// Required size of the pre-shared secret in bytes.
pub const PRESHARED_SECRET_SIZE: usize = 32;

/// Parameters for signing attestation certificates, fixed at provisioning
/// time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertSigningInfo {
    /// DER-encoded issuer name to place in attestation certificates.
    pub issuer: Vec<u8>,
    /// Expiry date for attestation certificates, as milliseconds since the
    /// UNIX epoch.
    pub expiry_ms: i64,
    /// Authority key identifier of the signing key.
    pub auth_key_id: Vec<u8>,
}

/// Data accumulated over the provisioning phase.
#[derive(Default)]
pub struct ProvisionData {
    /// Bitmask of [`PROVISION_STATUS_ATTESTATION_KEY`] and friends.
    pub status: u32,
    /// The key that signs attestation certificates.
    pub attestation_key: Option<KeyMaterial>,
    /// Committed certificate chain, as concatenated DER certificates.
    pub cert_chain: Vec<u8>,
    /// Chain chunks received but not yet committed.
    pending_chain: Vec<u8>,
    /// Certificate signing parameters.
    pub cert_signing_info: Option<CertSigningInfo>,
    /// Provisioned attestation identifiers.
    pub attestation_ids: Vec<KeyParam>,
    /// Pre-shared secret for the HMAC key negotiation.
    pub preshared_secret: Option<[u8; PRESHARED_SECRET_SIZE]>,
}

impl ProvisionData {
    pub fn locked(&self) -> bool {
        self.status & PROVISION_STATUS_PROVISIONING_LOCKED != 0
    }
}

/// Boot-time parameters delivered by the bootloader, refreshed every boot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootParams {
    pub os_version: u32,
    pub os_patchlevel: u32,
    pub verified_boot_key: Vec<u8>,
    pub verified_boot_hash: Vec<u8>,
    pub boot_state: VerifiedBootState,
    pub device_locked: bool,
}

impl BootParams {
    /// The root-of-trust encoding that key blobs are bound to.
    pub fn root_of_trust(&self) -> Result<Vec<u8>, Error> {
        let mut array = vec_try_with_capacity!(4)?;
        array.push(cbor::value::Value::Bytes(try_to_vec(&self.verified_boot_key)?));
        array.push(cbor::value::Value::Bytes(try_to_vec(&self.verified_boot_hash)?));
        array.push(self.boot_state.to_cbor_value()?);
        array.push(cbor::value::Value::Bool(self.device_locked));
        let mut data = Vec::new();
        cbor::ser::into_writer(&cbor::value::Value::Array(array), &mut data)
            .map_err(|_e| Error::Alloc("failed to serialize root of trust"))?;
        Ok(data)
    }
}

impl KeymasterApplet {
    fn check_not_provisioned(&self, bit: u32) -> Result<(), Error> {
        if self.provision.locked() {
            return Err(km_err!(RootOfTrustAlreadySet, "provisioning is locked"));
        }
        if self.provision.status & bit != 0 {
            return Err(km_err!(InvalidArgument, "already provisioned (bit {:#x})", bit));
        }
        Ok(())
    }

    pub(crate) fn provision_attestation_key(
        &mut self,
        req: ProvisionAttestationKeyRequest,
    ) -> Result<Vec<u8>, Error> {
        self.check_not_provisioned(PROVISION_STATUS_ATTESTATION_KEY)?;
        if req.key_format != KeyFormat::Raw {
            return Err(km_err!(
                UnsupportedKeyFormat,
                "attestation key format {:?} not supported",
                req.key_format
            ));
        }
        let key = match tag::get_algorithm(&req.params)? {
            Algorithm::Rsa => {
                let (d, n) = split_raw_pair(&req.key_data)?;
                let (key, _size) = self.imp.rsa.import_raw_key(&d, &n)?;
                key
            }
            Algorithm::Ec => {
                let curve = tag::check_ec_params(&req.params)?;
                let (scalar, point) = split_raw_pair(&req.key_data)?;
                let (key, _size) = self.imp.ec.import_raw_key(curve, &scalar, &point)?;
                key
            }
            algo => {
                return Err(km_err!(
                    UnsupportedAlgorithm,
                    "algorithm {:?} not valid for an attestation key",
                    algo
                ))
            }
        };
        self.provision.attestation_key = Some(key);
        self.provision.status |= PROVISION_STATUS_ATTESTATION_KEY;
        Ok(Vec::new())
    }

    pub(crate) fn provision_attestation_cert_chain(
        &mut self,
        req: ProvisionAttestationCertChainRequest,
    ) -> Result<Vec<u8>, Error> {
        if self.provision.locked() {
            return Err(km_err!(RootOfTrustAlreadySet, "provisioning is locked"));
        }
        if self.provision.status & PROVISION_STATUS_ATTESTATION_CERT_CHAIN != 0 {
            return Err(km_err!(InvalidArgument, "certificate chain already provisioned"));
        }
        self.provision.pending_chain.try_extend_from_slice(&req.data)?;
        if req.complete {
            self.provision.cert_chain = core::mem::take(&mut self.provision.pending_chain);
            self.provision.status |= PROVISION_STATUS_ATTESTATION_CERT_CHAIN;
            info!("committed {} bytes of certificate chain", self.provision.cert_chain.len());
        }
        Ok(Vec::new())
    }

    pub(crate) fn provision_attestation_cert_params(
        &mut self,
        req: ProvisionAttestationCertParamsRequest,
    ) -> Result<Vec<u8>, Error> {
        self.check_not_provisioned(PROVISION_STATUS_ATTESTATION_CERT_PARAMS)?;
        self.provision.cert_signing_info = Some(CertSigningInfo {
            issuer: req.issuer,
            expiry_ms: req.expiry_ms,
            auth_key_id: req.auth_key_id,
        });
        self.provision.status |= PROVISION_STATUS_ATTESTATION_CERT_PARAMS;
        Ok(Vec::new())
    }

    pub(crate) fn provision_attestation_ids(
        &mut self,
        req: ProvisionAttestationIdsRequest,
    ) -> Result<Vec<u8>, Error> {
        // Attestation ids may be replaced any number of times until
        // provisioning is locked.
        if self.provision.locked() {
            return Err(km_err!(RootOfTrustAlreadySet, "provisioning is locked"));
        }
        self.provision.attestation_ids = req.ids;
        self.provision.status |= PROVISION_STATUS_ATTEST_IDS;
        Ok(Vec::new())
    }

    pub(crate) fn provision_shared_secret(
        &mut self,
        req: ProvisionSharedSecretRequest,
    ) -> Result<Vec<u8>, Error> {
        self.check_not_provisioned(PROVISION_STATUS_PRESHARED_SECRET)?;
        let secret: [u8; PRESHARED_SECRET_SIZE] = req
            .secret
            .try_into()
            .map_err(|_e| km_err!(InvalidArgument, "pre-shared secret must be 32 bytes"))?;
        self.provision.preshared_secret = Some(secret);
        self.provision.status |= PROVISION_STATUS_PRESHARED_SECRET;
        Ok(Vec::new())
    }

    pub(crate) fn set_boot_params(&mut self, req: SetBootParamsRequest) -> Result<Vec<u8>, Error> {
        self.boot = Some(BootParams {
            os_version: req.os_version,
            os_patchlevel: req.os_patchlevel,
            verified_boot_key: req.verified_boot_key,
            verified_boot_hash: req.verified_boot_hash,
            boot_state: req.boot_state,
            device_locked: req.device_locked,
        });
        self.provision.status |= PROVISION_STATUS_BOOT_PARAMS;
        // A new boot invalidates all per-boot state.
        self.reset_per_boot_state();
        Ok(Vec::new())
    }

    pub(crate) fn lock_provisioning(&mut self) -> Result<Vec<u8>, Error> {
        if self.provision.locked() {
            return Err(km_err!(RootOfTrustAlreadySet, "provisioning already locked"));
        }
        if self.provision.status & LOCK_REQUIRED != LOCK_REQUIRED {
            return Err(km_err!(
                InvalidArgument,
                "provisioning incomplete (status {:#x})",
                self.provision.status
            ));
        }
        self.provision.status |= PROVISION_STATUS_PROVISIONING_LOCKED;
        self.state = crate::State::Active;
        info!("provisioning locked, applet active");
        Ok(Vec::new())
    }

    pub(crate) fn get_provision_status(&self) -> Result<Vec<u8>, Error> {
        let rsp = GetProvisionStatusResponse { status: self.provision.status };
        Ok(rsp.into_vec()?)
    }

    pub(crate) fn destroy_attestation_ids(&mut self) -> Result<Vec<u8>, Error> {
        self.provision.attestation_ids.clear();
        self.provision.status &= !PROVISION_STATUS_ATTEST_IDS;
        Ok(Vec::new())
    }
}

/// Split raw asymmetric key data, which is the CBOR array `[priv, pub]`:
/// private exponent and modulus for RSA, private scalar and public point for
/// EC.
pub(crate) fn split_raw_pair(key_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let value = kma_wire::read_to_value(key_data)
        .map_err(|_e| km_err!(InvalidArgument, "malformed raw key data"))?;
    let mut array = match value {
        cbor::value::Value::Array(a) if a.len() == 2 => a,
        _ => return Err(km_err!(InvalidArgument, "raw key data must be a 2-element array")),
    };
    let second = <Vec<u8>>::from_cbor_value(array.remove(1))
        .map_err(|_e| km_err!(InvalidArgument, "malformed raw key data"))?;
    let first = <Vec<u8>>::from_cbor_value(array.remove(0))
        .map_err(|_e| km_err!(InvalidArgument, "malformed raw key data"))?;
    Ok((first, second))
}
