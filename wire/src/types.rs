//! Command/response framing and per-instruction message types.
//!
//! A command is a 3-element CBOR array `[cla, ins, payload]` where `payload`
//! is the CBOR encoding of the instruction-specific request type. A response
//! is `[sw, error_code, rsp]`: the ISO7816-flavoured status word first, then
//! the Keymaster error code (only meaningful when the status word reports
//! success), then the CBOR encoding of the instruction-specific response.

use crate::keymaster::{
    HardwareAuthToken, KeyCharacteristics, KeyFormat, KeyParam, KeyPurpose, VerificationToken,
    VerifiedBootState,
};
use crate::sharedsecret::SharedSecretParameters;
use crate::{cbor_type_error, try_from_n, AsCborValue, CborError};
use alloc::vec::Vec;
use enumn::N;
use kma_derive::AsCborValue;

/// Class byte accepted by the applet.
pub const APPLET_CLA: i32 = 0x80;

/// Command processed successfully (which does not imply the contained error
/// code is `Ok`).
pub const SW_NO_ERROR: i32 = 0x9000;
/// Class byte not recognized.
pub const SW_CLA_NOT_SUPPORTED: i32 = 0x6e00;
/// Instruction byte not recognized.
pub const SW_INS_NOT_SUPPORTED: i32 = 0x6d00;
/// Instruction not legal in the current lifecycle phase.
pub const SW_CONDITIONS_NOT_SATISFIED: i32 = 0x6985;
/// Command payload failed to decode.
pub const SW_WRONG_DATA: i32 = 0x6a80;

/// Instruction codes. 0x01..0x08 are only legal while provisioning; the rest
/// only once the applet is active (with the exceptions handled by the
/// dispatcher).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N)]
#[repr(i32)]
pub enum Instruction {
    ProvisionAttestationKey = 0x01,
    ProvisionAttestationCertChain = 0x02,
    ProvisionAttestationCertParams = 0x03,
    ProvisionAttestationIds = 0x04,
    ProvisionSharedSecret = 0x05,
    SetBootParams = 0x06,
    LockProvisioning = 0x07,
    GetProvisionStatus = 0x08,
    GenerateKey = 0x21,
    ImportKey = 0x22,
    ImportWrappedKey = 0x23,
    ExportKey = 0x24,
    AttestKey = 0x25,
    UpgradeKey = 0x26,
    DeleteKey = 0x27,
    DeleteAllKeys = 0x28,
    AddRngEntropy = 0x29,
    ComputeSharedHmac = 0x2a,
    DestroyAttestationIds = 0x2b,
    VerifyAuthorization = 0x2c,
    GetHmacSharingParams = 0x2d,
    GetKeyCharacteristics = 0x2e,
    GetHwInfo = 0x2f,
    BeginOperation = 0x30,
    UpdateOperation = 0x31,
    FinishOperation = 0x32,
    AbortOperation = 0x33,
    DeviceLocked = 0x34,
    EarlyBootEnded = 0x35,
    GetCertChain = 0x36,
}
try_from_n!(Instruction);

/// A framed command as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct Command {
    pub cla: i32,
    pub ins: i32,
    pub payload: Vec<u8>,
}

/// A framed response.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct Response {
    pub sw: i32,
    pub error_code: i32,
    pub rsp: Vec<u8>,
}

// Provisioning-phase messages.

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ProvisionAttestationKeyRequest {
    pub key_format: KeyFormat,
    pub key_data: Vec<u8>,
    pub params: Vec<KeyParam>,
}

/// One chunk of the attestation certificate chain; `complete` marks the final
/// chunk and commits the accumulated chain.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ProvisionAttestationCertChainRequest {
    pub data: Vec<u8>,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ProvisionAttestationCertParamsRequest {
    pub issuer: Vec<u8>,
    pub expiry_ms: i64,
    pub auth_key_id: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ProvisionAttestationIdsRequest {
    pub ids: Vec<KeyParam>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ProvisionSharedSecretRequest {
    pub secret: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct SetBootParamsRequest {
    pub os_version: u32,
    pub os_patchlevel: u32,
    pub verified_boot_key: Vec<u8>,
    pub verified_boot_hash: Vec<u8>,
    pub boot_state: VerifiedBootState,
    pub device_locked: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GetProvisionStatusResponse {
    pub status: u32,
}

// Key lifecycle messages.

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GenerateKeyRequest {
    pub params: Vec<KeyParam>,
}

/// Response shared by all of the key-creation paths (generate, import,
/// import-wrapped).
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct KeyCreationResponse {
    pub key_blob: Vec<u8>,
    pub characteristics: KeyCharacteristics,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ImportKeyRequest {
    pub params: Vec<KeyParam>,
    pub key_format: KeyFormat,
    pub key_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ImportWrappedKeyRequest {
    /// AES-GCM ciphertext of the wrapped key's secret material.
    pub encrypted_key_data: Vec<u8>,
    /// GCM tag over the encrypted key material.
    pub tag: Vec<u8>,
    /// GCM nonce used for the key material encryption.
    pub nonce: Vec<u8>,
    /// Ephemeral transport key, RSA-OAEP-encrypted to the wrapping key.
    pub encrypted_transport_key: Vec<u8>,
    /// Format of the wrapped key material.
    pub key_format: KeyFormat,
    /// Description of the wrapped key, also the AAD for the GCM decryption.
    pub key_params: Vec<KeyParam>,
    /// Blob for the RSA key that unwraps the transport key.
    pub wrapping_key_blob: Vec<u8>,
    /// 32-byte masking value XORed into the decrypted transport key.
    pub masking_key: Vec<u8>,
    /// Parameters for the unwrapping operation on the wrapping key.
    pub unwrapping_params: Vec<KeyParam>,
    pub password_sid: i64,
    pub biometric_sid: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GetKeyCharacteristicsRequest {
    pub key_blob: Vec<u8>,
    pub app_id: Vec<u8>,
    pub app_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GetKeyCharacteristicsResponse {
    pub characteristics: KeyCharacteristics,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct UpgradeKeyRequest {
    pub key_blob: Vec<u8>,
    pub upgrade_params: Vec<KeyParam>,
}

/// The upgraded blob; empty when the stored blob needed no change.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct UpgradeKeyResponse {
    pub key_blob: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct DeleteKeyRequest {
    pub key_blob: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct AttestKeyRequest {
    pub key_blob: Vec<u8>,
    pub attest_params: Vec<KeyParam>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct AttestKeyResponse {
    pub cert: Vec<u8>,
}

// Operation messages.

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct BeginRequest {
    pub purpose: KeyPurpose,
    pub key_blob: Vec<u8>,
    pub params: Vec<KeyParam>,
    pub auth_token: Option<HardwareAuthToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct BeginResponse {
    pub op_handle: i64,
    pub out_params: Vec<KeyParam>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct UpdateRequest {
    pub op_handle: i64,
    pub params: Vec<KeyParam>,
    pub input: Vec<u8>,
    pub auth_token: Option<HardwareAuthToken>,
    pub verification_token: Option<VerificationToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct UpdateResponse {
    pub input_consumed: u32,
    pub out_params: Vec<KeyParam>,
    pub output: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct FinishRequest {
    pub op_handle: i64,
    pub params: Vec<KeyParam>,
    pub input: Vec<u8>,
    pub signature: Vec<u8>,
    pub auth_token: Option<HardwareAuthToken>,
    pub verification_token: Option<VerificationToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct FinishResponse {
    pub out_params: Vec<KeyParam>,
    pub output: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct AbortRequest {
    pub op_handle: i64,
}

// Shared secret and device lifecycle messages.

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GetHmacSharingParamsResponse {
    pub params: SharedSecretParameters,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ComputeSharedHmacRequest {
    pub params: Vec<SharedSecretParameters>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct ComputeSharedHmacResponse {
    pub sharing_check: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct AddRngEntropyRequest {
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct DeviceLockedRequest {
    pub password_only: bool,
    pub verification_token: Option<VerificationToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct GetCertChainResponse {
    pub cert_chain: Vec<u8>,
}
