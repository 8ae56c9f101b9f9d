//! Shared HMAC key negotiation and validation of the tokens MACed under the
//! negotiated key.

use crate::KeymasterApplet;
use alloc::vec::Vec;
use kma_common::crypto::{aes, hmac_sha256, Ckdf};
use kma_common::{km_err, Error, FallibleAllocExt};
use kma_wire::keymaster::{
    HardwareAuthToken, VerificationToken, AUTH_VERIFICATION_LABEL,
};
use kma_wire::sharedsecret::{
    SharedSecretParameters, KEY_AGREEMENT_LABEL, KEY_CHECK_LABEL,
};
use kma_wire::types::{
    ComputeSharedHmacRequest, ComputeSharedHmacResponse, GetHmacSharingParamsResponse,
};
use kma_wire::AsCborValue;
use log::warn;

/// Size of a sharing nonce in bytes.
const NONCE_SIZE: usize = 32;

/// Size of the negotiated HMAC key in bytes.
const HMAC_KEY_SIZE: usize = 32;

impl KeymasterApplet {
    pub(crate) fn get_hmac_sharing_params(&mut self) -> Result<Vec<u8>, Error> {
        if self.shared_secret_params.is_none() {
            let mut nonce = [0u8; NONCE_SIZE];
            self.imp.rng.fill_bytes(&mut nonce);
            self.shared_secret_params =
                Some(SharedSecretParameters { seed: Vec::new(), nonce: nonce.to_vec() });
        }
        let params = self
            .shared_secret_params
            .clone()
            .ok_or_else(|| km_err!(UnknownError, "sharing params vanished"))?;
        Ok(GetHmacSharingParamsResponse { params }.into_vec()?)
    }

    pub(crate) fn compute_shared_hmac(
        &mut self,
        req: ComputeSharedHmacRequest,
    ) -> Result<Vec<u8>, Error> {
        let own = self.shared_secret_params.clone().ok_or_else(|| {
            km_err!(HardwareNotYetAvailable, "own sharing params not yet retrieved")
        })?;
        let preshared = self.provision.preshared_secret.ok_or_else(|| {
            km_err!(HardwareNotYetAvailable, "pre-shared secret not provisioned")
        })?;

        // The context is the concatenation of every party's seed and nonce,
        // in the order given, and must include this applet's own contribution.
        let mut context = Vec::new();
        let mut seen_own = false;
        for params in &req.params {
            context.try_extend_from_slice(&params.seed)?;
            context.try_extend_from_slice(&params.nonce)?;
            if *params == own {
                seen_own = true;
            }
        }
        if !seen_own {
            return Err(km_err!(
                InvalidArgument,
                "own sharing params missing from negotiation"
            ));
        }

        let kak = aes::Key::Aes256(preshared);
        let hmac_key =
            self.imp.cmac.ckdf(&kak, KEY_AGREEMENT_LABEL.as_bytes(), &[&context], HMAC_KEY_SIZE)?;
        let sharing_check =
            hmac_sha256(&*self.imp.hmac, &hmac_key, &[KEY_CHECK_LABEL.as_bytes()])?;
        self.hmac_key = Some(hmac_key);
        Ok(ComputeSharedHmacResponse { sharing_check }.into_vec()?)
    }

    fn negotiated_hmac_key(&self) -> Result<&[u8], Error> {
        self.hmac_key.as_deref().ok_or_else(|| {
            km_err!(HardwareNotYetAvailable, "shared HMAC key not negotiated")
        })
    }

    /// Check the MAC on a hardware auth token. The MAC input is the packed
    /// token with a leading version byte; the challenge, user id and
    /// authenticator id travel little-endian, the authenticator type and
    /// timestamp in network order.
    pub(crate) fn verify_hardware_auth_token(
        &self,
        token: &HardwareAuthToken,
    ) -> Result<(), Error> {
        let key = self.negotiated_hmac_key()?;
        let mut msg = Vec::new();
        msg.try_push(0u8)?;
        msg.try_extend_from_slice(&token.challenge.to_le_bytes())?;
        msg.try_extend_from_slice(&token.user_id.to_le_bytes())?;
        msg.try_extend_from_slice(&token.authenticator_id.to_le_bytes())?;
        msg.try_extend_from_slice(&(token.authenticator_type as i32).to_be_bytes())?;
        msg.try_extend_from_slice(&token.timestamp.milliseconds.to_be_bytes())?;
        let mac = hmac_sha256(&*self.imp.hmac, key, &[&msg])?;
        if self.imp.verify.ne(&mac, &token.mac) {
            warn!("auth token MAC mismatch");
            return Err(km_err!(KeyUserNotAuthenticated, "auth token MAC mismatch"));
        }
        Ok(())
    }

    /// Check the MAC on a verification token. The MAC input is the label
    /// `"Auth Verification"` followed by the token fields in network order.
    pub(crate) fn verify_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), Error> {
        let key = self.negotiated_hmac_key()?;
        if !token.parameters_verified.is_empty() {
            return Err(km_err!(
                Unimplemented,
                "verification tokens with verified parameters not supported"
            ));
        }
        let mut msg = Vec::new();
        msg.try_extend_from_slice(AUTH_VERIFICATION_LABEL.as_bytes())?;
        msg.try_extend_from_slice(&token.challenge.to_be_bytes())?;
        msg.try_extend_from_slice(&token.timestamp.milliseconds.to_be_bytes())?;
        msg.try_extend_from_slice(&(token.security_level as i32).to_be_bytes())?;
        let mac = hmac_sha256(&*self.imp.hmac, key, &[&msg])?;
        if self.imp.verify.ne(&mac, &token.mac) {
            warn!("verification token MAC mismatch");
            return Err(km_err!(VerificationFailed, "verification token MAC mismatch"));
        }
        Ok(())
    }

    /// MAC a confirmation token's expected value: the negotiated HMAC key
    /// over the confirmation label and the message that was confirmed.
    pub(crate) fn confirmation_token_mac(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        let key = self.negotiated_hmac_key()?;
        hmac_sha256(
            &*self.imp.hmac,
            key,
            &[kma_wire::keymaster::CONFIRMATION_TOKEN_LABEL.as_bytes(), message],
        )
    }
}
