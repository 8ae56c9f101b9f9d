//! Key lifecycle commands: generate, import, import-wrapped, upgrade, delete
//! and characteristics retrieval.

use crate::provision::split_raw_pair;
use crate::KeymasterApplet;
use alloc::vec::Vec;
use kma_common::crypto::{aes, ec, rsa, KeyMaterial, SymmetricOperation};
use kma_common::keyblob::{self, EncryptedKeyBlob, PlaintextKeyBlob};
use kma_common::{get_opt_tag_value, km_err, tag, try_to_vec, Error, FallibleAllocExt};
use kma_wire::keymaster::{
    Algorithm, EcCurve, KeyCharacteristics, KeyFormat, KeyOrigin, KeyParam, KeyPurpose, Tag,
};
use kma_wire::types::{
    DeleteKeyRequest, GenerateKeyRequest, GetKeyCharacteristicsRequest,
    GetKeyCharacteristicsResponse, ImportKeyRequest, ImportWrappedKeyRequest, KeyCreationResponse,
    UpgradeKeyRequest, UpgradeKeyResponse,
};
use kma_wire::{AsCborValue, RsaExponent};

/// Size of the ephemeral transport key and the masking key for wrapped-key
/// import, in bytes.
const TRANSPORT_KEY_SIZE: usize = 32;

/// Recover the 12-byte GCM tag that fingerprints a blob for the per-boot use
/// counters, without decrypting it.
pub(crate) fn blob_auth_tag(blob: &[u8]) -> Option<[u8; keyblob::TAG_SIZE]> {
    EncryptedKeyBlob::from_slice(blob).ok().map(|b| b.tag)
}

impl KeymasterApplet {
    /// Parse and decrypt a key blob, rebuilding the hidden parameters from
    /// the caller-supplied parameters and the current root of trust.
    pub(crate) fn decrypt_key_blob(
        &self,
        blob: &[u8],
        params: &[KeyParam],
    ) -> Result<PlaintextKeyBlob, Error> {
        let rot = self.root_of_trust()?;
        let hidden = tag::hidden(params, &rot)?;
        let root_key = self.dev.keys.root_kek()?;
        keyblob::parse_and_decrypt(&*self.imp.aes, &*self.imp.hmac, &root_key, blob, &hidden)
    }

    /// Encrypt key material into a blob bound to the caller parameters and
    /// the current root of trust.
    fn encrypt_key_blob(
        &mut self,
        plaintext: PlaintextKeyBlob,
        params: &[KeyParam],
    ) -> Result<EncryptedKeyBlob, Error> {
        let rot = self.root_of_trust()?;
        let hidden = tag::hidden(params, &rot)?;
        let root_key = self.dev.keys.root_kek()?;
        let public_key = self.subject_public_key(&plaintext.key_material)?;
        keyblob::encrypt(
            &*self.imp.aes,
            &*self.imp.hmac,
            &mut *self.imp.rng,
            &root_key,
            plaintext,
            &hidden,
            public_key,
        )
    }

    /// `SubjectPublicKeyInfo` encoding of the public half of asymmetric key
    /// material, `None` for symmetric keys.
    pub(crate) fn subject_public_key(&self, key: &KeyMaterial) -> Result<Option<Vec<u8>>, Error> {
        match key {
            KeyMaterial::Rsa(k) => Ok(Some(self.imp.rsa.subject_public_key(k)?)),
            KeyMaterial::Ec(curve, k) => Ok(Some(self.imp.ec.subject_public_key(*curve, k)?)),
            _ => Ok(None),
        }
    }

    /// Check a stored blob's system version information against the current
    /// boot. Stale blobs must go through upgrade; blobs from a newer system
    /// are invalid, except that a key may move backwards to OS version zero.
    pub(crate) fn check_key_version(&self, chars: &KeyCharacteristics) -> Result<(), Error> {
        let boot = self.boot_params()?;
        let blob_version = get_opt_tag_value!(&chars.hw_enforced, OsVersion)?.copied().unwrap_or(0);
        let blob_patch =
            get_opt_tag_value!(&chars.hw_enforced, OsPatchlevel)?.copied().unwrap_or(0);
        if (blob_version > boot.os_version && boot.os_version != 0)
            || blob_patch > boot.os_patchlevel
        {
            return Err(km_err!(
                InvalidKeyBlob,
                "blob version {}/{} newer than system {}/{}",
                blob_version,
                blob_patch,
                boot.os_version,
                boot.os_patchlevel
            ));
        }
        if blob_version != boot.os_version || blob_patch != boot.os_patchlevel {
            return Err(km_err!(
                KeyRequiresUpgrade,
                "blob at version {}/{}, system at {}/{}",
                blob_version,
                blob_patch,
                boot.os_version,
                boot.os_patchlevel
            ));
        }
        Ok(())
    }

    pub(crate) fn generate_key(&mut self, req: GenerateKeyRequest) -> Result<Vec<u8>, Error> {
        let mut deduced = Vec::new();
        let key_material = match tag::get_algorithm(&req.params)? {
            Algorithm::Rsa => {
                let (key_size, pub_exponent) = tag::check_rsa_params(&req.params)?;
                self.imp.rsa.generate_key(
                    &mut *self.imp.rng,
                    key_size,
                    pub_exponent,
                    &req.params,
                )?
            }
            Algorithm::Ec => {
                let curve = tag::check_ec_params(&req.params)?;
                if tag::get_ec_curve(&req.params)?.is_none() {
                    deduced.try_push(KeyParam::EcCurve(curve))?;
                }
                if get_opt_tag_value!(&req.params, KeySize)?.is_none() {
                    deduced.try_push(KeyParam::KeySize(ec::curve_to_key_size(curve)))?;
                }
                self.imp.ec.generate_key(&mut *self.imp.rng, curve)?
            }
            Algorithm::Aes => {
                let variant = tag::check_aes_params(&req.params)?;
                self.imp.aes.generate_key(&mut *self.imp.rng, variant)?
            }
            Algorithm::TripleDes => {
                tag::check_3des_params(&req.params)?;
                self.imp.des.generate_key(&mut *self.imp.rng)?
            }
            Algorithm::Hmac => {
                let key_size = tag::check_hmac_params(&req.params)?;
                self.imp.hmac.generate_key(&mut *self.imp.rng, key_size)?
            }
        };
        self.finish_key_creation(KeyOrigin::Generated, &req.params, &deduced, key_material)
    }

    pub(crate) fn import_key(&mut self, req: ImportKeyRequest) -> Result<Vec<u8>, Error> {
        self.import_key_material(KeyOrigin::Imported, &req.params, req.key_format, &req.key_data)
    }

    pub(crate) fn import_wrapped_key(
        &mut self,
        req: ImportWrappedKeyRequest,
    ) -> Result<Vec<u8>, Error> {
        // Unwrap the ephemeral transport key with the RSA wrapping key.
        let wrapping = self.decrypt_key_blob(&req.wrapping_key_blob, &req.unwrapping_params)?;
        tag::check_begin_params(
            &wrapping.characteristics,
            KeyPurpose::WrapKey,
            &req.unwrapping_params,
        )?;
        let wrapping_key = match wrapping.key_material {
            KeyMaterial::Rsa(k) => k,
            _ => return Err(km_err!(UnsupportedAlgorithm, "wrapping key must be RSA")),
        };
        let mode = rsa::DecryptionMode::new(&req.unwrapping_params)?;
        if !matches!(mode, rsa::DecryptionMode::OaepPadding { .. }) {
            return Err(km_err!(
                UnsupportedPaddingMode,
                "transport key unwrap requires RSA-OAEP"
            ));
        }
        let mut unwrap_op = self.imp.rsa.begin_decrypt(wrapping_key, mode)?;
        unwrap_op.update(&req.encrypted_transport_key)?;
        let mut transport_key = unwrap_op.finish()?;
        if transport_key.len() != TRANSPORT_KEY_SIZE
            || req.masking_key.len() != TRANSPORT_KEY_SIZE
        {
            return Err(km_err!(
                InvalidArgument,
                "transport key {} / masking key {} bytes, want {}",
                transport_key.len(),
                req.masking_key.len(),
                TRANSPORT_KEY_SIZE
            ));
        }
        for (b, m) in transport_key.iter_mut().zip(req.masking_key.iter()) {
            *b ^= m;
        }

        // The wrapped key description doubles as the AAD for the key material
        // decryption.
        let aad = req.key_params.clone().into_vec()?;
        let nonce: [u8; aes::GCM_NONCE_SIZE] = req
            .nonce
            .try_into()
            .map_err(|_e| km_err!(InvalidNonce, "want {} byte nonce", aes::GCM_NONCE_SIZE))?;
        let mut decrypt_op = self.imp.aes.begin_aead(
            aes::Key::new(transport_key)?,
            aes::GcmMode::GcmTag16 { nonce },
            SymmetricOperation::Decrypt,
        )?;
        decrypt_op.update_aad(&aad)?;
        let mut raw_key = decrypt_op.update(&req.encrypted_key_data)?;
        raw_key.try_extend_from_slice(&decrypt_op.update(&req.tag)?)?;
        raw_key.try_extend_from_slice(&decrypt_op.finish()?)?;

        // The host-side secure ids replace whatever the wrapped description
        // claimed.
        let had_sid = req.key_params.iter().any(|p| p.tag() == Tag::UserSecureId);
        let mut params = Vec::new();
        for param in &req.key_params {
            if param.tag() != Tag::UserSecureId {
                params.try_push(param.clone())?;
            }
        }
        if had_sid {
            if req.password_sid != 0 {
                params.try_push(KeyParam::UserSecureId(req.password_sid as u64))?;
            }
            if req.biometric_sid != 0 {
                params.try_push(KeyParam::UserSecureId(req.biometric_sid as u64))?;
            }
        }

        self.import_key_material(KeyOrigin::SecurelyImported, &params, req.key_format, &raw_key)
    }

    /// Shared tail of the import paths: validate the raw key data against the
    /// declared parameters, deducing any the caller omitted, and build the
    /// blob.
    fn import_key_material(
        &mut self,
        origin: KeyOrigin,
        params: &[KeyParam],
        key_format: KeyFormat,
        key_data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if key_format != KeyFormat::Raw {
            return Err(km_err!(
                Unimplemented,
                "import of {:?}-format keys not supported",
                key_format
            ));
        }
        let mut deduced = Vec::new();
        let key_material = match tag::get_algorithm(params)? {
            Algorithm::Rsa => {
                let (priv_exponent, modulus) = split_raw_pair(key_data)?;
                let (key, key_size) = self.imp.rsa.import_raw_key(&priv_exponent, &modulus)?;
                if key_size.0 != rsa::REQUIRED_KEY_SIZE_BITS {
                    return Err(km_err!(
                        UnsupportedKeySize,
                        "RSA key size {} not supported",
                        key_size.0
                    ));
                }
                match get_opt_tag_value!(params, KeySize)? {
                    Some(sz) if *sz != key_size => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported RSA key is {} bits, params say {}",
                            key_size.0,
                            sz.0
                        ))
                    }
                    Some(_) => {}
                    None => deduced.try_push(KeyParam::KeySize(key_size))?,
                }
                match get_opt_tag_value!(params, RsaPublicExponent)? {
                    Some(e) if e.0 != rsa::REQUIRED_EXPONENT => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported RSA key has exponent {}, params say {}",
                            rsa::REQUIRED_EXPONENT,
                            e.0
                        ))
                    }
                    Some(_) => {}
                    None => deduced
                        .try_push(KeyParam::RsaPublicExponent(RsaExponent(rsa::REQUIRED_EXPONENT)))?,
                }
                key
            }
            Algorithm::Ec => {
                let curve = match tag::get_ec_curve(params)? {
                    Some(curve) => curve,
                    None => match get_opt_tag_value!(params, KeySize)? {
                        Some(sz) => ec::key_size_to_curve(*sz)?,
                        None => EcCurve::P256,
                    },
                };
                if curve != EcCurve::P256 {
                    return Err(km_err!(
                        UnsupportedEcCurve,
                        "EC curve {:?} not supported",
                        curve
                    ));
                }
                let (priv_scalar, pub_point) = split_raw_pair(key_data)?;
                let (key, key_size) = self.imp.ec.import_raw_key(curve, &priv_scalar, &pub_point)?;
                if tag::get_ec_curve(params)?.is_none() {
                    deduced.try_push(KeyParam::EcCurve(curve))?;
                }
                match get_opt_tag_value!(params, KeySize)? {
                    Some(sz) if *sz != key_size => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported EC key is {} bits, params say {}",
                            key_size.0,
                            sz.0
                        ))
                    }
                    Some(_) => {}
                    None => deduced.try_push(KeyParam::KeySize(key_size))?,
                }
                key
            }
            Algorithm::Aes => {
                let (key, key_size) = self.imp.aes.import_key(key_data)?;
                match get_opt_tag_value!(params, KeySize)? {
                    Some(sz) if *sz != key_size => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported AES key is {} bits, params say {}",
                            key_size.0,
                            sz.0
                        ))
                    }
                    Some(_) => {}
                    None => deduced.try_push(KeyParam::KeySize(key_size))?,
                }
                let mut all_params = try_to_vec(params)?;
                all_params.try_extend_from_slice(&deduced)?;
                tag::check_aes_params(&all_params)?;
                key
            }
            Algorithm::TripleDes => {
                let key = self.imp.des.import_key(key_data)?;
                match get_opt_tag_value!(params, KeySize)? {
                    Some(sz) if *sz != kma_common::crypto::des::KEY_SIZE_BITS => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported 3-DES key is {} bits, params say {}",
                            kma_common::crypto::des::KEY_SIZE_BITS.0,
                            sz.0
                        ))
                    }
                    Some(_) => {}
                    None => {
                        deduced.try_push(KeyParam::KeySize(kma_common::crypto::des::KEY_SIZE_BITS))?
                    }
                }
                key
            }
            Algorithm::Hmac => {
                let (key, key_size) = self.imp.hmac.import_key(key_data)?;
                match get_opt_tag_value!(params, KeySize)? {
                    Some(sz) if *sz != key_size => {
                        return Err(km_err!(
                            ImportParameterMismatch,
                            "imported HMAC key is {} bits, params say {}",
                            key_size.0,
                            sz.0
                        ))
                    }
                    Some(_) => {}
                    None => deduced.try_push(KeyParam::KeySize(key_size))?,
                }
                let mut all_params = try_to_vec(params)?;
                all_params.try_extend_from_slice(&deduced)?;
                tag::check_hmac_params(&all_params)?;
                key
            }
        };
        self.finish_key_creation(origin, params, &deduced, key_material)
    }

    /// Shared tail of all key-creation paths: build the characteristics,
    /// wrap everything into a blob, and encode the response.
    fn finish_key_creation(
        &mut self,
        origin: KeyOrigin,
        params: &[KeyParam],
        deduced: &[KeyParam],
        key_material: KeyMaterial,
    ) -> Result<Vec<u8>, Error> {
        let boot = self.boot_params()?;
        let (os_version, os_patchlevel) = (boot.os_version, boot.os_patchlevel);
        let characteristics =
            tag::extract_key_characteristics(origin, params, deduced, os_version, os_patchlevel)?;
        let plaintext = PlaintextKeyBlob { characteristics, key_material };
        let encrypted = self.encrypt_key_blob(plaintext, params)?;
        let characteristics = encrypted.characteristics.clone();
        let key_blob = encrypted.into_vec()?;
        Ok(KeyCreationResponse { key_blob, characteristics }.into_vec()?)
    }

    pub(crate) fn upgrade_key(&mut self, req: UpgradeKeyRequest) -> Result<Vec<u8>, Error> {
        let mut plaintext = self.decrypt_key_blob(&req.key_blob, &req.upgrade_params)?;
        let boot = self.boot_params()?;
        let (cur_version, cur_patch) = (boot.os_version, boot.os_patchlevel);
        let chars = &plaintext.characteristics;
        let blob_version = get_opt_tag_value!(&chars.hw_enforced, OsVersion)?.copied().unwrap_or(0);
        let blob_patch =
            get_opt_tag_value!(&chars.hw_enforced, OsPatchlevel)?.copied().unwrap_or(0);

        if blob_version == cur_version && blob_patch == cur_patch {
            // Nothing to change; an empty blob tells the caller to keep using
            // the existing one.
            return Ok(UpgradeKeyResponse { key_blob: Vec::new() }.into_vec()?);
        }
        // Versions never move backwards, except that the OS version may drop
        // to zero.
        if (blob_version > cur_version && cur_version != 0) || blob_patch > cur_patch {
            return Err(km_err!(
                InvalidArgument,
                "cannot downgrade key from {}/{} to {}/{}",
                blob_version,
                blob_patch,
                cur_version,
                cur_patch
            ));
        }

        for param in plaintext.characteristics.hw_enforced.iter_mut() {
            match param {
                KeyParam::OsVersion(v) => *v = cur_version,
                KeyParam::OsPatchlevel(p) => *p = cur_patch,
                _ => {}
            }
        }
        // The old blob's use counter dies with it.
        if let Some(tag) = blob_auth_tag(&req.key_blob) {
            self.forget_use_count(&tag);
        }
        let encrypted = self.encrypt_key_blob(plaintext, &req.upgrade_params)?;
        Ok(UpgradeKeyResponse { key_blob: encrypted.into_vec()? }.into_vec()?)
    }

    pub(crate) fn delete_key(&mut self, req: DeleteKeyRequest) -> Result<Vec<u8>, Error> {
        if let Some(tag) = blob_auth_tag(&req.key_blob) {
            self.forget_use_count(&tag);
        }
        Ok(Vec::new())
    }

    pub(crate) fn delete_all_keys(&mut self) -> Result<Vec<u8>, Error> {
        self.clear_use_counts();
        Ok(Vec::new())
    }

    pub(crate) fn get_key_characteristics(
        &self,
        req: GetKeyCharacteristicsRequest,
    ) -> Result<Vec<u8>, Error> {
        let mut params = Vec::new();
        if !req.app_id.is_empty() {
            params.try_push(KeyParam::ApplicationId(req.app_id))?;
        }
        if !req.app_data.is_empty() {
            params.try_push(KeyParam::ApplicationData(req.app_data))?;
        }
        let plaintext = self.decrypt_key_blob(&req.key_blob, &params)?;
        Ok(GetKeyCharacteristicsResponse { characteristics: plaintext.characteristics }
            .into_vec()?)
    }
}
