//! Attestation certificate generation.

use crate::KeymasterApplet;
use alloc::string::String;
use alloc::vec::Vec;
use kma_common::crypto::{hmac_sha256, KeyMaterial};
use kma_common::{
    get_bool_tag_value, get_opt_tag_value, km_err, tag, try_to_vec, Error, FallibleAllocExt,
};
use kma_wire::keymaster::{
    Algorithm, Digest, KeyParam, Tag, VerifiedBootState, MAX_ATTESTATION_CHALLENGE_LEN,
};
use kma_wire::types::{AttestKeyRequest, AttestKeyResponse, GetCertChainResponse};
use kma_wire::AsCborValue;

/// Size of a truncated unique id in bytes.
const UNIQUE_ID_LEN: usize = 16;

/// Width of a unique-id rotation bucket in milliseconds (30 days).
const UNIQUE_ID_BUCKET_MS: i64 = 2_592_000_000;

/// Everything the certificate assembler needs to build an attestation
/// certificate, other than the subject public key and the signature.
#[derive(Clone, Debug)]
pub struct CertificateInfo {
    /// DER-encoded issuer name.
    pub issuer: Vec<u8>,
    /// Authority key identifier of the signing key.
    pub auth_key_id: Vec<u8>,
    /// `notBefore`, as an ASN.1 time string.
    pub not_before: String,
    /// `notAfter`, as an ASN.1 time string.
    pub not_after: String,
    /// Challenge supplied by the caller, echoed in the attestation extension.
    pub attestation_challenge: Vec<u8>,
    /// Identity of the application that requested attestation.
    pub attestation_app_id: Vec<u8>,
    /// Truncated HMAC identifying the key across a rotation bucket; empty
    /// unless the key was created with `INCLUDE_UNIQUE_ID`.
    pub unique_id: Vec<u8>,
    /// Hardware-enforced characteristics of the attested key, including any
    /// attestation identifiers the caller asked for.
    pub hw_enforced: Vec<KeyParam>,
    /// Software-enforced characteristics of the attested key.
    pub sw_enforced: Vec<KeyParam>,
    /// Verified-boot key of the current boot.
    pub verified_boot_key: Vec<u8>,
    /// Verified-boot hash of the current boot.
    pub verified_boot_hash: Vec<u8>,
    /// Verified-boot state of the current boot.
    pub boot_state: VerifiedBootState,
    /// Whether the device booted with a locked bootloader.
    pub device_locked: bool,
}

/// Break a timestamp in milliseconds since the UNIX epoch into a UTC civil
/// date and time. Uses plain integer arithmetic throughout.
fn decompose_epoch_ms(ms: i64) -> (i64, u32, u32, u32, u32, u32) {
    let secs = ms.div_euclid(1000);
    let days = secs.div_euclid(86_400);
    let day_secs = secs.rem_euclid(86_400);
    let (hour, minute, second) =
        ((day_secs / 3600) as u32, ((day_secs / 60) % 60) as u32, (day_secs % 60) as u32);

    // Civil-from-days, using eras of 400 years (146097 days).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day, hour, minute, second)
}

/// Format a timestamp as an ASN.1 time string: `UTCTime` (two-digit year)
/// before 2050, `GeneralizedTime` from 2050 onwards.
pub fn asn1_time(ms: i64) -> Result<String, Error> {
    let (year, month, day, hour, minute, second) = decompose_epoch_ms(ms);
    if !(1950..=9999).contains(&year) {
        return Err(km_err!(InvalidArgument, "year {} out of certificate range", year));
    }
    if year < 2050 {
        Ok(alloc::format!(
            "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            year % 100,
            month,
            day,
            hour,
            minute,
            second
        ))
    } else {
        Ok(alloc::format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            year,
            month,
            day,
            hour,
            minute,
            second
        ))
    }
}

impl KeymasterApplet {
    /// Derive the unique id for an attestation: a truncated HMAC over the
    /// 30-day rotation bucket of the key's creation time, the application
    /// id, and the rotation-reset flag, keyed with a hardware-backed secret.
    fn unique_id(
        &self,
        creation_ms: i64,
        app_id: &[u8],
        reset_since_rotation: bool,
    ) -> Result<Vec<u8>, Error> {
        let hbk = self.dev.keys.unique_id_hbk()?;
        let bucket = alloc::format!("{}", creation_ms / UNIQUE_ID_BUCKET_MS);
        let mut mac = hmac_sha256(
            &*self.imp.hmac,
            &hbk,
            &[bucket.as_bytes(), app_id, &[u8::from(reset_since_rotation)]],
        )?;
        mac.truncate(UNIQUE_ID_LEN);
        Ok(mac)
    }

    pub(crate) fn attest_key(&mut self, req: AttestKeyRequest) -> Result<Vec<u8>, Error> {
        let key = self.decrypt_key_blob(&req.key_blob, &req.attest_params)?;
        let chars = &key.characteristics;
        let algorithm = tag::get_algorithm(&chars.hw_enforced)?;
        if algorithm != Algorithm::Rsa && algorithm != Algorithm::Ec {
            return Err(km_err!(
                IncompatibleAlgorithm,
                "cannot attest a {:?} key",
                algorithm
            ));
        }

        let challenge = get_opt_tag_value!(&req.attest_params, AttestationChallenge)?
            .ok_or_else(|| km_err!(AttestationChallengeMissing, "no attestation challenge"))?;
        if challenge.len() > MAX_ATTESTATION_CHALLENGE_LEN {
            return Err(km_err!(
                InvalidInputLength,
                "attestation challenge too large ({} bytes)",
                challenge.len()
            ));
        }
        let app_id = get_opt_tag_value!(&req.attest_params, AttestationApplicationId)?
            .ok_or_else(|| {
                km_err!(AttestationApplicationIdMissing, "no attestation application id")
            })?;

        let requested_ids = self.matched_attestation_ids(&req.attest_params)?;

        let unique_id = if get_bool_tag_value!(&chars.hw_enforced, IncludeUniqueId) {
            let creation_ms = get_opt_tag_value!(&chars.sw_enforced, CreationDatetime)?
                .map(|dt| dt.ms_since_epoch)
                .unwrap_or(0);
            let reset = get_bool_tag_value!(&req.attest_params, ResetSinceIdRotation);
            self.unique_id(creation_ms, app_id, reset)?
        } else {
            Vec::new()
        };

        let signing_info = self
            .provision
            .cert_signing_info
            .clone()
            .ok_or_else(|| km_err!(AttestationKeysNotProvisioned, "no cert params"))?;
        let attestation_key = self
            .provision
            .attestation_key
            .clone()
            .ok_or_else(|| km_err!(AttestationKeysNotProvisioned, "no attestation key"))?;

        let not_before_ms = get_opt_tag_value!(&chars.sw_enforced, ActiveDatetime)?
            .map(|dt| dt.ms_since_epoch)
            .or_else(|| {
                // Fall back to creation time; errors were caught above.
                get_opt_tag_value!(&chars.sw_enforced, CreationDatetime)
                    .ok()
                    .flatten()
                    .map(|dt| dt.ms_since_epoch)
            })
            .unwrap_or(0);
        let not_after_ms = get_opt_tag_value!(&chars.sw_enforced, UsageExpireDatetime)?
            .map(|dt| dt.ms_since_epoch)
            .unwrap_or(signing_info.expiry_ms);

        let boot = self.boot_params()?;
        let mut hw_enforced = try_to_vec(&chars.hw_enforced)?;
        hw_enforced.try_extend_from_slice(&requested_ids)?;
        let info = CertificateInfo {
            issuer: signing_info.issuer,
            auth_key_id: signing_info.auth_key_id,
            not_before: asn1_time(not_before_ms)?,
            not_after: asn1_time(not_after_ms)?,
            attestation_challenge: try_to_vec(challenge)?,
            attestation_app_id: try_to_vec(app_id)?,
            unique_id,
            hw_enforced,
            sw_enforced: try_to_vec(&chars.sw_enforced)?,
            verified_boot_key: try_to_vec(&boot.verified_boot_key)?,
            verified_boot_hash: try_to_vec(&boot.verified_boot_hash)?,
            boot_state: boot.boot_state,
            device_locked: boot.device_locked,
        };

        let spki = self
            .subject_public_key(&key.key_material)?
            .ok_or_else(|| km_err!(UnknownError, "asymmetric key without public part"))?;

        let imp = &self.imp;
        let mut signer = |tbs: &[u8]| -> Result<Vec<u8>, Error> {
            let mut op = match &attestation_key {
                KeyMaterial::Rsa(k) => imp.rsa.begin_sign(
                    k.clone(),
                    kma_common::crypto::rsa::SignMode::Pkcs1_1_5Padding(Digest::Sha256),
                )?,
                KeyMaterial::Ec(curve, k) => {
                    imp.ec.begin_sign(*curve, k.clone(), Digest::Sha256)?
                }
                _ => return Err(km_err!(UnknownError, "bad attestation key type")),
            };
            op.update(tbs)?;
            op.finish()
        };
        let cert = self.dev.cert.assemble(&info, &spki, &mut signer)?;
        Ok(AttestKeyResponse { cert }.into_vec()?)
    }

    /// Check any attestation identifiers in the request against the
    /// provisioned values, returning the matched parameters for inclusion in
    /// the certificate. Any mismatch or unprovisioned identifier fails the
    /// attestation.
    fn matched_attestation_ids(&self, params: &[KeyParam]) -> Result<Vec<KeyParam>, Error> {
        let mut matched = Vec::new();
        for param in params {
            if !matches!(
                param.tag(),
                Tag::AttestationIdBrand
                    | Tag::AttestationIdDevice
                    | Tag::AttestationIdProduct
                    | Tag::AttestationIdSerial
                    | Tag::AttestationIdImei
                    | Tag::AttestationIdMeid
                    | Tag::AttestationIdManufacturer
                    | Tag::AttestationIdModel
            ) {
                continue;
            }
            if !self.provision.attestation_ids.contains(param) {
                return Err(km_err!(
                    CannotAttestIds,
                    "attestation id {:?} not provisioned",
                    param.tag()
                ));
            }
            matched.try_push(param.clone())?;
        }
        Ok(matched)
    }

    pub(crate) fn get_cert_chain(&self) -> Result<Vec<u8>, Error> {
        if self.provision.cert_chain.is_empty() {
            return Err(km_err!(AttestationKeysNotProvisioned, "no certificate chain"));
        }
        let rsp = GetCertChainResponse { cert_chain: try_to_vec(&self.provision.cert_chain)? };
        Ok(rsp.into_vec()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_epoch_ms() {
        // 2020-01-01T00:00:00Z
        assert_eq!(decompose_epoch_ms(1_577_836_800_000), (2020, 1, 1, 0, 0, 0));
        // 2051-01-01T00:00:00Z
        assert_eq!(decompose_epoch_ms(2_556_144_000_000), (2051, 1, 1, 0, 0, 0));
        // 2024-02-29T12:34:56Z (leap day)
        assert_eq!(decompose_epoch_ms(1_709_210_096_000), (2024, 2, 29, 12, 34, 56));
        // 1970-01-01T00:00:00Z
        assert_eq!(decompose_epoch_ms(0), (1970, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_asn1_time_formats() {
        // Before 2050 the two-digit UTCTime form is used.
        assert_eq!(asn1_time(1_577_836_800_000).unwrap(), "200101000000Z");
        // From 2050 onwards the four-digit GeneralizedTime form is used.
        assert_eq!(asn1_time(2_556_144_000_000).unwrap(), "20510101000000Z");
    }
}
