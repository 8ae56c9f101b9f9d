//! The cryptographic operation lifecycle: `begin` claims a slot and sets up
//! the backend operation, `update` feeds it data, `finish` completes it and
//! releases the slot, `abort` releases it early.

use crate::keys::blob_auth_tag;
use crate::{KeymasterApplet, LockState};
use alloc::boxed::Box;
use alloc::vec::Vec;
use kma_common::crypto::{
    aes, des, rsa, AadOperation, AccumulatingOperation, EmittingOperation, KeyMaterial,
    SymmetricOperation,
};
use kma_common::keyblob;
use kma_common::{
    get_bool_tag_value, get_opt_tag_value, km_err, tag, try_to_vec, Error, FallibleAllocExt,
};
use kma_wire::keymaster::{
    Algorithm, HardwareAuthToken, HardwareAuthenticatorType, KeyCharacteristics, KeyParam,
    KeyPurpose, VerificationToken,
};
use kma_wire::types::{
    AbortRequest, BeginRequest, BeginResponse, FinishRequest, FinishResponse, UpdateRequest,
    UpdateResponse,
};
use kma_wire::AsCborValue;

/// Number of operations that can be in flight at once.
pub(crate) const MAX_OPERATIONS: usize = 4;

/// Maximum message size buffered for trusted confirmation, matching the limit
/// the confirmation UI enforces.
const MAX_CONFIRMATION_MESSAGE_SIZE: usize = 6144;

/// An HMAC is never shorter than 64 bits, so a signature under verification
/// must carry at least that much.
const MIN_HMAC_VERIFY_BITS: u32 = 64;

/// An in-flight operation.
pub(crate) struct Operation {
    /// Operation handle, which doubles as the challenge for per-operation
    /// auth tokens. Never zero.
    pub(crate) handle: i64,
    purpose: KeyPurpose,
    crypto: CryptoOperation,
    auth: Option<AuthInfo>,
    /// Accumulated message when the key demands trusted confirmation.
    conf_data: Option<Vec<u8>>,
    /// Requested MAC length in bytes, for HMAC signing.
    mac_len: Option<usize>,
    /// Minimum acceptable signature length in bytes, for HMAC verification.
    min_mac_len: usize,
}

/// The state held by the crypto backend for an operation.
enum CryptoOperation {
    Cipher(Box<dyn EmittingOperation>),
    Aead {
        op: Box<dyn AadOperation>,
        /// Set once ciphertext/plaintext has been fed in; AAD is rejected
        /// after that point.
        data_begun: bool,
    },
    Accumulating(Box<dyn AccumulatingOperation>),
}

/// User-authentication requirements carried by an operation.
struct AuthInfo {
    secure_ids: Vec<u64>,
    /// Bitmask of acceptable [`HardwareAuthenticatorType`] values; zero
    /// means any.
    auth_type: u32,
    /// Keys without an auth timeout need a fresh token naming this
    /// operation's handle on every `update`/`finish`.
    per_op: bool,
    /// For timeout-bound keys: the timeout and the timestamp of the token
    /// accepted at `begin`.
    timeout: Option<(u32, i64)>,
}

impl KeymasterApplet {
    pub(crate) fn begin_operation(&mut self, req: BeginRequest) -> Result<Vec<u8>, Error> {
        let slot = self
            .operations
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| km_err!(TooManyOperations, "all {} slots in use", MAX_OPERATIONS))?;

        // The blob's GCM tag keys the per-boot use counters.
        let blob_tag = blob_auth_tag(&req.key_blob);
        let key = self.decrypt_key_blob(&req.key_blob, &req.params)?;
        let chars = key.characteristics;
        let key_material = key.key_material;
        self.check_key_version(&chars)?;
        tag::check_begin_params(&chars, req.purpose, &req.params)?;
        let algorithm = tag::get_algorithm(&chars.hw_enforced)?;
        if algorithm != key_material.algorithm() {
            return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch"));
        }

        // A fresh handle, also used as the auth challenge.
        let mut handle = self.imp.rng.next_u64() as i64;
        while handle == 0 || self.operations.iter().flatten().any(|op| op.handle == handle) {
            handle = self.imp.rng.next_u64() as i64;
        }

        let auth = self.check_begin_auth(&chars, req.auth_token.as_ref())?;
        if get_bool_tag_value!(&chars.hw_enforced, UnlockedDeviceRequired) {
            self.check_device_unlocked(req.auth_token.as_ref())?;
        }
        // An auth token is the only wall clock available, so validity dates
        // are enforced whenever one is presented.
        let now_hint = req.auth_token.as_ref().map(|t| t.timestamp.milliseconds);
        check_validity_dates(&chars, req.purpose, now_hint)?;

        if let Some(max_uses) = get_opt_tag_value!(&chars.hw_enforced, MaxUsesPerBoot)? {
            let blob_tag = blob_tag
                .ok_or_else(|| km_err!(InvalidKeyBlob, "use-limited key blob unparseable"))?;
            self.update_use_count(blob_tag, *max_uses)?;
        }
        if let Some(min_secs) = get_opt_tag_value!(&chars.hw_enforced, MinSecondsBetweenOps)? {
            let blob_tag = blob_tag
                .ok_or_else(|| km_err!(InvalidKeyBlob, "rate-limited key blob unparseable"))?;
            self.check_rate_limit(blob_tag, *min_secs)?;
        }

        let conf_data = if req.purpose == KeyPurpose::Sign
            && get_bool_tag_value!(&chars.hw_enforced, TrustedConfirmationRequired)
        {
            Some(Vec::new())
        } else {
            None
        };

        let caller_nonce = get_opt_tag_value!(&req.params, Nonce)?;
        let mut out_params = Vec::new();
        let mut mac_len = None;
        let min_mac_len = get_opt_tag_value!(&chars.hw_enforced, MinMacLength)?
            .copied()
            .unwrap_or(0)
            .max(MIN_HMAC_VERIFY_BITS) as usize
            / 8;

        let crypto = match (algorithm, req.purpose) {
            (Algorithm::Aes, KeyPurpose::Encrypt | KeyPurpose::Decrypt) => {
                let aes_key = match key_material {
                    KeyMaterial::Aes(k) => k,
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let dir = SymmetricOperation::try_from(req.purpose)?;
                let mode = aes::Mode::new(&req.params, caller_nonce, &mut *self.imp.rng)?;
                if caller_nonce.is_none() && req.purpose == KeyPurpose::Encrypt {
                    // Surface the generated nonce.
                    match &mode {
                        aes::Mode::Cipher(
                            aes::CipherMode::CbcNoPadding { nonce }
                            | aes::CipherMode::CbcPkcs7Padding { nonce }
                            | aes::CipherMode::Ctr { nonce },
                        ) => out_params.try_push(KeyParam::Nonce(nonce.to_vec()))?,
                        aes::Mode::Aead(
                            aes::GcmMode::GcmTag12 { nonce }
                            | aes::GcmMode::GcmTag13 { nonce }
                            | aes::GcmMode::GcmTag14 { nonce }
                            | aes::GcmMode::GcmTag15 { nonce }
                            | aes::GcmMode::GcmTag16 { nonce },
                        ) => out_params.try_push(KeyParam::Nonce(nonce.to_vec()))?,
                        aes::Mode::Cipher(
                            aes::CipherMode::EcbNoPadding | aes::CipherMode::EcbPkcs7Padding,
                        ) => {}
                    }
                }
                match mode {
                    aes::Mode::Cipher(mode) => {
                        CryptoOperation::Cipher(self.imp.aes.begin(aes_key, mode, dir)?)
                    }
                    aes::Mode::Aead(mode) => CryptoOperation::Aead {
                        op: self.imp.aes.begin_aead(aes_key, mode, dir)?,
                        data_begun: false,
                    },
                }
            }
            (Algorithm::TripleDes, KeyPurpose::Encrypt | KeyPurpose::Decrypt) => {
                let des_key = match key_material {
                    KeyMaterial::TripleDes(k) => k,
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let dir = SymmetricOperation::try_from(req.purpose)?;
                let mode = des::Mode::new(&req.params, caller_nonce, &mut *self.imp.rng)?;
                if caller_nonce.is_none() && req.purpose == KeyPurpose::Encrypt {
                    if let des::Mode::CbcNoPadding { nonce }
                    | des::Mode::CbcPkcs7Padding { nonce } = &mode
                    {
                        out_params.try_push(KeyParam::Nonce(nonce.to_vec()))?;
                    }
                }
                CryptoOperation::Cipher(self.imp.des.begin(des_key, mode, dir)?)
            }
            (Algorithm::Hmac, KeyPurpose::Sign | KeyPurpose::Verify) => {
                let hmac_key = match key_material {
                    KeyMaterial::Hmac(k) => k,
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let digest = tag::get_digest(&req.params)
                    .or_else(|_e| tag::get_digest(&chars.hw_enforced))?;
                if req.purpose == KeyPurpose::Sign {
                    // check_begin_params has bounded the length already.
                    mac_len = Some(tag::get_mac_length(&req.params)? as usize / 8);
                }
                CryptoOperation::Accumulating(self.imp.hmac.begin(hmac_key, digest)?)
            }
            (Algorithm::Rsa, KeyPurpose::Sign) => {
                let rsa_key = match key_material {
                    KeyMaterial::Rsa(k) => k,
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let mode = rsa::SignMode::new(&req.params)?;
                CryptoOperation::Accumulating(self.imp.rsa.begin_sign(rsa_key, mode)?)
            }
            (Algorithm::Rsa, KeyPurpose::Decrypt) => {
                let rsa_key = match key_material {
                    KeyMaterial::Rsa(k) => k,
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let mode = rsa::DecryptionMode::new(&req.params)?;
                CryptoOperation::Accumulating(self.imp.rsa.begin_decrypt(rsa_key, mode)?)
            }
            (Algorithm::Ec, KeyPurpose::Sign) => {
                let (curve, ec_key) = match key_material {
                    KeyMaterial::Ec(curve, k) => (curve, k),
                    _ => return Err(km_err!(InvalidKeyBlob, "blob algorithm mismatch")),
                };
                let digest = tag::get_digest(&req.params)
                    .or_else(|_e| tag::get_digest(&chars.hw_enforced))?;
                CryptoOperation::Accumulating(self.imp.ec.begin_sign(curve, ec_key, digest)?)
            }
            (algorithm, purpose) => {
                return Err(km_err!(
                    UnsupportedPurpose,
                    "purpose {:?} not supported for {:?} keys",
                    purpose,
                    algorithm
                ))
            }
        };

        self.operations[slot] = Some(Operation {
            handle,
            purpose: req.purpose,
            crypto,
            auth,
            conf_data,
            mac_len,
            min_mac_len,
        });
        Ok(BeginResponse { op_handle: handle, out_params }.into_vec()?)
    }

    pub(crate) fn update_operation(&mut self, req: UpdateRequest) -> Result<Vec<u8>, Error> {
        let idx = self.find_operation(req.op_handle)?;
        let result = self.update_inner(idx, req);
        if result.is_err() {
            // A failed update kills the operation.
            self.operations[idx] = None;
        }
        result
    }

    fn update_inner(&mut self, idx: usize, req: UpdateRequest) -> Result<Vec<u8>, Error> {
        self.check_op_auth(idx, req.auth_token.as_ref())?;
        self.check_timeout_auth(idx, req.verification_token.as_ref())?;

        let op = self.operations[idx]
            .as_mut()
            .ok_or_else(|| km_err!(InvalidOperationHandle, "operation vanished"))?;
        if let Some(buf) = &mut op.conf_data {
            if buf.len() + req.input.len() > MAX_CONFIRMATION_MESSAGE_SIZE {
                return Err(km_err!(
                    InvalidInputLength,
                    "confirmation message larger than {} bytes",
                    MAX_CONFIRMATION_MESSAGE_SIZE
                ));
            }
            buf.try_extend_from_slice(&req.input)?;
        }

        let aad = get_opt_tag_value!(&req.params, AssociatedData)?;
        let output = match &mut op.crypto {
            CryptoOperation::Aead { op: aead, data_begun } => {
                if let Some(aad) = aad {
                    if *data_begun {
                        return Err(km_err!(
                            InvalidTag,
                            "associated data arrived after cipher data"
                        ));
                    }
                    aead.update_aad(aad)?;
                }
                if req.input.is_empty() {
                    Vec::new()
                } else {
                    *data_begun = true;
                    aead.update(&req.input)?
                }
            }
            CryptoOperation::Cipher(cipher) => {
                if aad.is_some() {
                    return Err(km_err!(InvalidTag, "associated data for a non-AEAD operation"));
                }
                cipher.update(&req.input)?
            }
            CryptoOperation::Accumulating(acc) => {
                if aad.is_some() {
                    return Err(km_err!(InvalidTag, "associated data for a non-AEAD operation"));
                }
                acc.update(&req.input)?;
                Vec::new()
            }
        };
        Ok(UpdateResponse {
            input_consumed: req.input.len() as u32,
            out_params: Vec::new(),
            output,
        }
        .into_vec()?)
    }

    pub(crate) fn finish_operation(&mut self, req: FinishRequest) -> Result<Vec<u8>, Error> {
        let idx = self.find_operation(req.op_handle)?;
        let result = self.finish_inner(idx, req);
        // The slot is released whether the operation succeeded or not.
        self.operations[idx] = None;
        result
    }

    fn finish_inner(&mut self, idx: usize, req: FinishRequest) -> Result<Vec<u8>, Error> {
        self.check_op_auth(idx, req.auth_token.as_ref())?;
        self.check_timeout_auth(idx, req.verification_token.as_ref())?;

        let mut op = self.operations[idx]
            .take()
            .ok_or_else(|| km_err!(InvalidOperationHandle, "operation vanished"))?;

        if let Some(mut message) = op.conf_data.take() {
            if message.len() + req.input.len() > MAX_CONFIRMATION_MESSAGE_SIZE {
                return Err(km_err!(
                    InvalidInputLength,
                    "confirmation message larger than {} bytes",
                    MAX_CONFIRMATION_MESSAGE_SIZE
                ));
            }
            message.try_extend_from_slice(&req.input)?;
            let token = get_opt_tag_value!(&req.params, ConfirmationToken)?
                .ok_or_else(|| km_err!(NoUserConfirmation, "confirmation token missing"))?;
            let expected = self.confirmation_token_mac(&message)?;
            if self.imp.verify.ne(&expected, token) {
                return Err(km_err!(NoUserConfirmation, "confirmation token mismatch"));
            }
        }

        let output = match op.crypto {
            CryptoOperation::Cipher(mut cipher) => {
                let mut output = cipher.update(&req.input)?;
                output.try_extend_from_slice(&cipher.finish()?)?;
                output
            }
            CryptoOperation::Aead { op: mut aead, data_begun: _ } => {
                let mut output = aead.update(&req.input)?;
                output.try_extend_from_slice(&aead.finish()?)?;
                output
            }
            CryptoOperation::Accumulating(mut acc) => {
                acc.update(&req.input)?;
                let mut output = acc.finish()?;
                match op.purpose {
                    KeyPurpose::Sign => {
                        if let Some(mac_len) = op.mac_len {
                            output.truncate(mac_len);
                        }
                        output
                    }
                    KeyPurpose::Verify => {
                        // HMAC verification against the caller's signature.
                        let sig = &req.signature;
                        if sig.len() < op.min_mac_len || sig.len() > output.len() {
                            return Err(km_err!(
                                InvalidMacLength,
                                "signature of {} bytes outside [{}, {}]",
                                sig.len(),
                                op.min_mac_len,
                                output.len()
                            ));
                        }
                        if self.imp.verify.ne(&output[..sig.len()], sig) {
                            return Err(km_err!(VerificationFailed, "MAC mismatch"));
                        }
                        Vec::new()
                    }
                    _ => output,
                }
            }
        };
        Ok(FinishResponse { out_params: Vec::new(), output }.into_vec()?)
    }

    pub(crate) fn abort_operation(&mut self, req: AbortRequest) -> Result<Vec<u8>, Error> {
        let idx = self.find_operation(req.op_handle)?;
        self.operations[idx] = None;
        Ok(Vec::new())
    }

    fn find_operation(&self, handle: i64) -> Result<usize, Error> {
        self.operations
            .iter()
            .position(|op| matches!(op, Some(op) if op.handle == handle))
            .ok_or_else(|| km_err!(InvalidOperationHandle, "operation {:#x} not found", handle))
    }

    /// Work out the auth requirements an operation must carry, validating the
    /// presented token for timeout-bound keys.
    fn check_begin_auth(
        &self,
        chars: &KeyCharacteristics,
        token: Option<&HardwareAuthToken>,
    ) -> Result<Option<AuthInfo>, Error> {
        if get_bool_tag_value!(&chars.hw_enforced, NoAuthRequired) {
            return Ok(None);
        }
        let mut secure_ids = Vec::new();
        for param in &chars.hw_enforced {
            if let KeyParam::UserSecureId(sid) = param {
                secure_ids.try_push(*sid)?;
            }
        }
        if secure_ids.is_empty() {
            return Ok(None);
        }
        let auth_type =
            get_opt_tag_value!(&chars.hw_enforced, UserAuthType)?.copied().unwrap_or(0);
        match get_opt_tag_value!(&chars.hw_enforced, AuthTimeout)?.copied() {
            Some(timeout_secs) => {
                let token = token.ok_or_else(|| {
                    km_err!(KeyUserNotAuthenticated, "auth-bound key used without a token")
                })?;
                self.validate_auth_token(token, &secure_ids, auth_type, None)?;
                Ok(Some(AuthInfo {
                    secure_ids,
                    auth_type,
                    per_op: false,
                    timeout: Some((timeout_secs, token.timestamp.milliseconds)),
                }))
            }
            None => Ok(Some(AuthInfo { secure_ids, auth_type, per_op: true, timeout: None })),
        }
    }

    /// Per-operation auth check applied at `update` and `finish`: keys bound
    /// to an authenticator but without a timeout need a token naming this
    /// operation's handle as its challenge.
    fn check_op_auth(
        &self,
        idx: usize,
        token: Option<&HardwareAuthToken>,
    ) -> Result<(), Error> {
        let per_op = {
            let op = self.operations[idx]
                .as_ref()
                .ok_or_else(|| km_err!(InvalidOperationHandle, "operation vanished"))?;
            match &op.auth {
                Some(auth) if auth.per_op => {
                    Some((op.handle, try_to_vec(&auth.secure_ids)?, auth.auth_type))
                }
                _ => None,
            }
        };
        if let Some((handle, secure_ids, auth_type)) = per_op {
            let token = token.ok_or_else(|| {
                km_err!(KeyUserNotAuthenticated, "per-operation auth token missing")
            })?;
            self.validate_auth_token(token, &secure_ids, auth_type, Some(handle))?;
        }
        Ok(())
    }

    /// Timeout-bound keys must prove the auth window is still open with a
    /// verification token on every `update` and `finish`: missing token means
    /// the time check cannot be made at all.
    fn check_timeout_auth(
        &self,
        idx: usize,
        vtoken: Option<&VerificationToken>,
    ) -> Result<(), Error> {
        let timeout = self.operations[idx]
            .as_ref()
            .and_then(|op| op.auth.as_ref())
            .and_then(|auth| auth.timeout);
        let (timeout_secs, auth_time_ms) = match timeout {
            Some(t) => t,
            None => return Ok(()),
        };
        let vtoken = vtoken.ok_or_else(|| {
            km_err!(VerificationFailed, "timeout-bound key used without a verification token")
        })?;
        self.verify_verification_token(vtoken)?;
        if vtoken.timestamp.milliseconds > auth_time_ms + i64::from(timeout_secs) * 1000 {
            return Err(km_err!(KeyUserNotAuthenticated, "auth timeout expired"));
        }
        Ok(())
    }

    fn validate_auth_token(
        &self,
        token: &HardwareAuthToken,
        secure_ids: &[u64],
        auth_type: u32,
        challenge: Option<i64>,
    ) -> Result<(), Error> {
        self.verify_hardware_auth_token(token)?;
        if let Some(challenge) = challenge {
            if token.challenge != challenge {
                return Err(km_err!(
                    KeyUserNotAuthenticated,
                    "token challenge does not name this operation"
                ));
            }
        }
        if !secure_ids.contains(&(token.user_id as u64))
            && !secure_ids.contains(&(token.authenticator_id as u64))
        {
            return Err(km_err!(
                KeyUserNotAuthenticated,
                "token user not among the key's secure ids"
            ));
        }
        if auth_type != 0 && (token.authenticator_type as i32 as u32) & auth_type == 0 {
            return Err(km_err!(
                KeyUserNotAuthenticated,
                "authenticator type {:?} not accepted by key",
                token.authenticator_type
            ));
        }
        Ok(())
    }

    /// Let a valid, fresh auth token unlock the device for keys that require
    /// an unlocked device.
    fn check_device_unlocked(
        &mut self,
        token: Option<&HardwareAuthToken>,
    ) -> Result<(), Error> {
        match self.lock_state {
            LockState::Unlocked => Ok(()),
            LockState::Locked { password_only, since } => {
                if let Some(token) = token {
                    if self.verify_hardware_auth_token(token).is_ok()
                        && token.timestamp.milliseconds > since.milliseconds
                        && (!password_only
                            || token.authenticator_type == HardwareAuthenticatorType::Password)
                    {
                        self.lock_state = LockState::Unlocked;
                        return Ok(());
                    }
                }
                Err(km_err!(DeviceLocked, "device locked and no fresh auth token"))
            }
        }
    }

    pub(crate) fn update_use_count(
        &mut self,
        blob_tag: [u8; keyblob::TAG_SIZE],
        max_uses: u32,
    ) -> Result<(), Error> {
        if let Some(counter) = self.use_counters.iter_mut().find(|c| c.tag == blob_tag) {
            if counter.count >= max_uses {
                return Err(km_err!(
                    KeyMaxOpsExceeded,
                    "key already used {} times this boot",
                    counter.count
                ));
            }
            counter.count += 1;
        } else {
            self.use_counters.try_push(crate::UseCounter { tag: blob_tag, count: 1 })?;
        }
        Ok(())
    }

    /// Enforce the minimum interval between uses of a rate-limited key.
    /// Without a monotonic clock there is nothing to measure against, and the
    /// limit is not enforced.
    fn check_rate_limit(
        &mut self,
        blob_tag: [u8; keyblob::TAG_SIZE],
        min_secs: u32,
    ) -> Result<(), Error> {
        let now = match &self.imp.clock {
            Some(clock) => clock.now().0,
            None => return Ok(()),
        };
        if let Some(entry) = self.rate_limits.iter_mut().find(|e| e.tag == blob_tag) {
            if now - entry.last_use_ms < i64::from(min_secs) * 1000 {
                return Err(km_err!(
                    KeyRateLimitExceeded,
                    "key used again within {} seconds",
                    min_secs
                ));
            }
            entry.last_use_ms = now;
        } else {
            self.rate_limits.try_push(crate::RateLimit { tag: blob_tag, last_use_ms: now })?;
        }
        Ok(())
    }
}

/// Check a key's validity dates against a wall-clock hint, when one is
/// available. Encryption and signing are origination operations; decryption
/// and verification are usage operations.
fn check_validity_dates(
    chars: &KeyCharacteristics,
    purpose: KeyPurpose,
    now_ms: Option<i64>,
) -> Result<(), Error> {
    let now = match now_ms {
        Some(now) => now,
        None => return Ok(()),
    };
    if let Some(active) = get_opt_tag_value!(&chars.sw_enforced, ActiveDatetime)? {
        if now < active.ms_since_epoch {
            return Err(km_err!(KeyNotYetValid, "key not active until {}", active.ms_since_epoch));
        }
    }
    match purpose {
        KeyPurpose::Encrypt | KeyPurpose::Sign => {
            if let Some(expiry) =
                get_opt_tag_value!(&chars.sw_enforced, OriginationExpireDatetime)?
            {
                if now > expiry.ms_since_epoch {
                    return Err(km_err!(
                        KeyExpired,
                        "key origination expired at {}",
                        expiry.ms_since_epoch
                    ));
                }
            }
        }
        KeyPurpose::Decrypt | KeyPurpose::Verify => {
            if let Some(expiry) = get_opt_tag_value!(&chars.sw_enforced, UsageExpireDatetime)? {
                if now > expiry.ms_since_epoch {
                    return Err(km_err!(
                        KeyExpired,
                        "key usage expired at {}",
                        expiry.ms_since_epoch
                    ));
                }
            }
        }
        KeyPurpose::WrapKey => {}
    }
    Ok(())
}
