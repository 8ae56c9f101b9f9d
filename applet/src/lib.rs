//! A Keymaster applet: the command-processing core of a hardware security
//! module that creates, stores and uses cryptographic keys on behalf of an
//! Android host.
//!
//! The applet starts in a provisioning phase, during which factory tooling
//! installs the attestation key material, the pre-shared secret and the boot
//! parameters. Locking provisioning moves it to the active phase, where the
//! full operational command set becomes available. Commands arrive as
//! CBOR-framed [`Command`] structures and are answered with [`Response`]
//! structures; all state lives inside [`KeymasterApplet`], with the actual
//! cryptography and device-specific secrets abstracted behind the
//! [`kma_common::crypto::Implementation`] and [`device::Implementation`]
//! trait collections.

#![no_std]
extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use kma_common::crypto;
use kma_common::{keyblob, km_err, Error};
use kma_wire::keymaster::{ErrorCode, HardwareInfo, SecurityLevel, Timestamp};
use kma_wire::sharedsecret::SharedSecretParameters;
use kma_wire::types::{
    AbortRequest, AddRngEntropyRequest, AttestKeyRequest, BeginRequest, Command,
    ComputeSharedHmacRequest, DeleteKeyRequest, DeviceLockedRequest, FinishRequest,
    GenerateKeyRequest, GetKeyCharacteristicsRequest, ImportKeyRequest, ImportWrappedKeyRequest,
    Instruction, ProvisionAttestationCertChainRequest, ProvisionAttestationCertParamsRequest,
    ProvisionAttestationIdsRequest, ProvisionAttestationKeyRequest, ProvisionSharedSecretRequest,
    Response, SetBootParamsRequest, UpdateRequest, UpgradeKeyRequest, APPLET_CLA,
    SW_CLA_NOT_SUPPORTED, SW_CONDITIONS_NOT_SATISFIED, SW_INS_NOT_SUPPORTED, SW_NO_ERROR,
    SW_WRONG_DATA,
};
use kma_wire::AsCborValue;
use log::warn;

pub mod attest;
pub mod device;
mod keys;
mod operation;
pub mod provision;
mod secret;

use operation::{Operation, MAX_OPERATIONS};
use provision::{BootParams, ProvisionData};

/// Maximum size of an entropy contribution in bytes.
const MAX_RNG_ENTROPY_SIZE: usize = 2048;

/// Lifecycle phase of the applet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Factory provisioning: only the provisioning command set is legal.
    Provisioning,
    /// Provisioning is locked and the operational command set is available.
    Active,
}

/// Host device lock status, as reported via the `DeviceLocked` command.
pub(crate) enum LockState {
    Unlocked,
    Locked {
        /// Only password-authenticated tokens may unlock.
        password_only: bool,
        /// Tokens from before this point are stale.
        since: Timestamp,
    },
}

/// Per-boot use counter for a key with `MaxUsesPerBoot`, keyed by the blob's
/// authentication tag.
pub(crate) struct UseCounter {
    pub(crate) tag: [u8; keyblob::TAG_SIZE],
    pub(crate) count: u32,
}

/// Last-use record for a key with `MinSecondsBetweenOps`.
pub(crate) struct RateLimit {
    pub(crate) tag: [u8; keyblob::TAG_SIZE],
    pub(crate) last_use_ms: i64,
}

/// The applet itself: all mutable state, plus the crypto and device
/// abstractions it runs on.
pub struct KeymasterApplet {
    pub(crate) imp: crypto::Implementation,
    pub(crate) dev: device::Implementation,
    pub(crate) state: State,
    pub(crate) provision: ProvisionData,
    pub(crate) boot: Option<BootParams>,
    pub(crate) shared_secret_params: Option<SharedSecretParameters>,
    /// HMAC key negotiated with the other shared-secret participants.
    pub(crate) hmac_key: Option<Vec<u8>>,
    pub(crate) operations: [Option<Operation>; MAX_OPERATIONS],
    pub(crate) use_counters: Vec<UseCounter>,
    pub(crate) rate_limits: Vec<RateLimit>,
    pub(crate) lock_state: LockState,
}

impl KeymasterApplet {
    /// Create a new applet instance in the provisioning phase.
    pub fn new(imp: crypto::Implementation, dev: device::Implementation) -> Self {
        Self {
            imp,
            dev,
            state: State::Provisioning,
            provision: ProvisionData::default(),
            boot: None,
            shared_secret_params: None,
            hmac_key: None,
            operations: core::array::from_fn(|_i| None),
            use_counters: Vec::new(),
            rate_limits: Vec::new(),
            lock_state: LockState::Unlocked,
        }
    }

    /// Process a single CBOR-framed command, producing the CBOR-framed
    /// response.
    pub fn process(&mut self, req: &[u8]) -> Vec<u8> {
        let (sw, error_code, rsp) = self.process_inner(req);
        let response = Response { sw, error_code: error_code as i32, rsp };
        response.into_vec().unwrap_or_default()
    }

    fn process_inner(&mut self, req: &[u8]) -> (i32, ErrorCode, Vec<u8>) {
        let cmd = match Command::from_slice(req) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("failed to decode command frame: {:?}", e);
                return (SW_WRONG_DATA, ErrorCode::Ok, Vec::new());
            }
        };
        if cmd.cla != APPLET_CLA {
            return (SW_CLA_NOT_SUPPORTED, ErrorCode::Ok, Vec::new());
        }
        let ins = match Instruction::try_from(cmd.ins) {
            Ok(ins) => ins,
            Err(_e) => return (SW_INS_NOT_SUPPORTED, ErrorCode::Ok, Vec::new()),
        };
        if !self.instruction_allowed(ins) {
            return (SW_CONDITIONS_NOT_SATISFIED, ErrorCode::Ok, Vec::new());
        }
        match self.dispatch(ins, &cmd.payload) {
            Ok(rsp) => (SW_NO_ERROR, ErrorCode::Ok, rsp),
            // A payload that fails to decode is a framing error, not a
            // Keymaster error.
            Err(Error::Cbor(e)) => {
                warn!("failed to decode {:?} payload: {:?}", ins, e);
                (SW_WRONG_DATA, ErrorCode::Ok, Vec::new())
            }
            Err(e) => {
                warn!("{:?} failed: {:?}", ins, e);
                (SW_NO_ERROR, e.code(), Vec::new())
            }
        }
    }

    /// Check an instruction against the current lifecycle phase. Boot
    /// parameters arrive on every boot and status may always be queried, so
    /// those two remain legal after provisioning is locked.
    fn instruction_allowed(&self, ins: Instruction) -> bool {
        match self.state {
            State::Provisioning => (ins as i32) <= (Instruction::GetProvisionStatus as i32),
            State::Active => {
                (ins as i32) >= (Instruction::GenerateKey as i32)
                    || matches!(
                        ins,
                        Instruction::SetBootParams | Instruction::GetProvisionStatus
                    )
            }
        }
    }

    fn dispatch(&mut self, ins: Instruction, payload: &[u8]) -> Result<Vec<u8>, Error> {
        match ins {
            Instruction::ProvisionAttestationKey => {
                let req = ProvisionAttestationKeyRequest::from_slice(payload)?;
                self.provision_attestation_key(req)
            }
            Instruction::ProvisionAttestationCertChain => {
                let req = ProvisionAttestationCertChainRequest::from_slice(payload)?;
                self.provision_attestation_cert_chain(req)
            }
            Instruction::ProvisionAttestationCertParams => {
                let req = ProvisionAttestationCertParamsRequest::from_slice(payload)?;
                self.provision_attestation_cert_params(req)
            }
            Instruction::ProvisionAttestationIds => {
                let req = ProvisionAttestationIdsRequest::from_slice(payload)?;
                self.provision_attestation_ids(req)
            }
            Instruction::ProvisionSharedSecret => {
                let req = ProvisionSharedSecretRequest::from_slice(payload)?;
                self.provision_shared_secret(req)
            }
            Instruction::SetBootParams => {
                let req = SetBootParamsRequest::from_slice(payload)?;
                self.set_boot_params(req)
            }
            Instruction::LockProvisioning => self.lock_provisioning(),
            Instruction::GetProvisionStatus => self.get_provision_status(),
            Instruction::GenerateKey => {
                let req = GenerateKeyRequest::from_slice(payload)?;
                self.generate_key(req)
            }
            Instruction::ImportKey => {
                let req = ImportKeyRequest::from_slice(payload)?;
                self.import_key(req)
            }
            Instruction::ImportWrappedKey => {
                let req = ImportWrappedKeyRequest::from_slice(payload)?;
                self.import_wrapped_key(req)
            }
            Instruction::ExportKey => Err(km_err!(Unimplemented, "key export not supported")),
            Instruction::AttestKey => {
                let req = AttestKeyRequest::from_slice(payload)?;
                self.attest_key(req)
            }
            Instruction::UpgradeKey => {
                let req = UpgradeKeyRequest::from_slice(payload)?;
                self.upgrade_key(req)
            }
            Instruction::DeleteKey => {
                let req = DeleteKeyRequest::from_slice(payload)?;
                self.delete_key(req)
            }
            Instruction::DeleteAllKeys => self.delete_all_keys(),
            Instruction::AddRngEntropy => {
                let req = AddRngEntropyRequest::from_slice(payload)?;
                self.add_rng_entropy(req)
            }
            Instruction::ComputeSharedHmac => {
                let req = ComputeSharedHmacRequest::from_slice(payload)?;
                self.compute_shared_hmac(req)
            }
            Instruction::DestroyAttestationIds => self.destroy_attestation_ids(),
            Instruction::VerifyAuthorization => {
                Err(km_err!(Unimplemented, "authorization verification not supported"))
            }
            Instruction::GetHmacSharingParams => self.get_hmac_sharing_params(),
            Instruction::GetKeyCharacteristics => {
                let req = GetKeyCharacteristicsRequest::from_slice(payload)?;
                self.get_key_characteristics(req)
            }
            Instruction::GetHwInfo => self.get_hw_info(),
            Instruction::BeginOperation => {
                let req = BeginRequest::from_slice(payload)?;
                self.begin_operation(req)
            }
            Instruction::UpdateOperation => {
                let req = UpdateRequest::from_slice(payload)?;
                self.update_operation(req)
            }
            Instruction::FinishOperation => {
                let req = FinishRequest::from_slice(payload)?;
                self.finish_operation(req)
            }
            Instruction::AbortOperation => {
                let req = AbortRequest::from_slice(payload)?;
                self.abort_operation(req)
            }
            Instruction::DeviceLocked => {
                let req = DeviceLockedRequest::from_slice(payload)?;
                self.device_locked(req)
            }
            Instruction::EarlyBootEnded => {
                Err(km_err!(Unimplemented, "early-boot keys not supported"))
            }
            Instruction::GetCertChain => self.get_cert_chain(),
        }
    }

    /// The boot parameters, which must have been delivered before any key
    /// operation.
    pub(crate) fn boot_params(&self) -> Result<&BootParams, Error> {
        self.boot
            .as_ref()
            .ok_or_else(|| km_err!(HardwareNotYetAvailable, "boot parameters not yet received"))
    }

    pub(crate) fn root_of_trust(&self) -> Result<Vec<u8>, Error> {
        self.boot_params()?.root_of_trust()
    }

    /// Drop the per-boot records for a key that ceases to exist.
    pub(crate) fn forget_use_count(&mut self, tag: &[u8; keyblob::TAG_SIZE]) {
        self.use_counters.retain(|c| &c.tag != tag);
        self.rate_limits.retain(|e| &e.tag != tag);
    }

    pub(crate) fn clear_use_counts(&mut self) {
        self.use_counters.clear();
        self.rate_limits.clear();
    }

    /// Discard everything scoped to a single boot: in-flight operations, the
    /// negotiated HMAC key and its sharing nonce, use counters and the lock
    /// state.
    pub(crate) fn reset_per_boot_state(&mut self) {
        self.operations = core::array::from_fn(|_i| None);
        self.shared_secret_params = None;
        self.hmac_key = None;
        self.use_counters.clear();
        self.rate_limits.clear();
        self.lock_state = LockState::Unlocked;
    }

    fn add_rng_entropy(&mut self, req: AddRngEntropyRequest) -> Result<Vec<u8>, Error> {
        if req.data.len() > MAX_RNG_ENTROPY_SIZE {
            return Err(km_err!(
                InvalidInputLength,
                "entropy contribution of {} bytes too large",
                req.data.len()
            ));
        }
        self.imp.rng.add_entropy(&req.data);
        Ok(Vec::new())
    }

    fn get_hw_info(&self) -> Result<Vec<u8>, Error> {
        let info = HardwareInfo {
            security_level: SecurityLevel::Strongbox,
            keymaster_name: String::from("KeymasterApplet"),
            author_name: String::from("Android Open Source Project"),
        };
        Ok(info.into_vec()?)
    }

    /// Record that the host device has (un)locked. A valid verification token
    /// timestamps the lock so that only later auth tokens can unlock keys
    /// that require an unlocked device.
    fn device_locked(&mut self, req: DeviceLockedRequest) -> Result<Vec<u8>, Error> {
        let since = match &req.verification_token {
            Some(token) => {
                self.verify_verification_token(token)?;
                token.timestamp
            }
            None => Timestamp { milliseconds: 0 },
        };
        self.lock_state = LockState::Locked { password_only: req.password_only, since };
        Ok(Vec::new())
    }
}
