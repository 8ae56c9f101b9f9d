//! End-to-end tests driving the applet through its CBOR command interface,
//! with the software crypto backend underneath.

use kma_applet::attest::CertificateInfo;
use kma_applet::provision::{
    PROVISION_STATUS_ATTESTATION_KEY, PROVISION_STATUS_PROVISIONING_LOCKED,
};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use kma_applet::{device, KeymasterApplet};
use kma_common::crypto::{aes, hmac_sha256, Ckdf};
use kma_common::keyblob::EncryptedKeyBlob;
use kma_common::{hex_decode, Error};
use kma_crypto_soft::{SoftAesCmac, SoftHmac};
use kma_wire::keymaster::{
    Algorithm, BlockMode, Digest, EcCurve, ErrorCode, HardwareAuthToken,
    HardwareAuthenticatorType, KeyFormat, KeyOrigin, KeyParam, KeyPurpose, PaddingMode,
    SecurityLevel, Timestamp, VerificationToken, VerifiedBootState, AUTH_VERIFICATION_LABEL,
};
use kma_wire::sharedsecret::KEY_AGREEMENT_LABEL;
use kma_wire::types::{
    AbortRequest, AddRngEntropyRequest, AttestKeyRequest, AttestKeyResponse, BeginRequest,
    BeginResponse, Command, ComputeSharedHmacRequest, ComputeSharedHmacResponse,
    DeviceLockedRequest, FinishRequest, FinishResponse, GenerateKeyRequest, GetCertChainResponse,
    GetHmacSharingParamsResponse, GetKeyCharacteristicsRequest, GetKeyCharacteristicsResponse,
    GetProvisionStatusResponse, ImportKeyRequest, ImportWrappedKeyRequest, Instruction,
    KeyCreationResponse, ProvisionAttestationCertChainRequest,
    ProvisionAttestationCertParamsRequest, ProvisionAttestationIdsRequest,
    ProvisionAttestationKeyRequest, ProvisionSharedSecretRequest, Response, SetBootParamsRequest,
    UpdateRequest, UpdateResponse, UpgradeKeyRequest, UpgradeKeyResponse, APPLET_CLA,
    SW_CLA_NOT_SUPPORTED, SW_CONDITIONS_NOT_SATISFIED, SW_INS_NOT_SUPPORTED, SW_NO_ERROR,
    SW_WRONG_DATA,
};
use kma_wire::{cbor, AsCborValue, KeySizeInBits, RsaExponent};
use rand_core::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;

// RFC 6979 appendix A.2.5 P-256 key pair.
const EC_PRIV_HEX: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
const EC_PUB_HEX: &str = "0460fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6\
                          7903fe1008b8bc99a41ae9e95628bc64f2f1b20c2d7e9f5177a3c294d4462299";

struct TestKeys;

impl device::RetrieveKeyMaterial for TestKeys {
    fn root_kek(&self) -> Result<aes::Key, Error> {
        Ok(aes::Key::Aes128([7u8; 16]))
    }
    fn unique_id_hbk(&self) -> Result<Vec<u8>, Error> {
        Ok(vec![0x55; 32])
    }
}

/// Fake certificate assembler: concatenates the interesting fields so tests
/// can check what reached it, and appends the signature over them.
struct TestCertAssembler;

impl device::CertAssembler for TestCertAssembler {
    fn assemble(
        &self,
        info: &CertificateInfo,
        spki: &[u8],
        signer: &mut device::TbsSigner,
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        out.extend_from_slice(&info.issuer);
        out.extend_from_slice(info.not_before.as_bytes());
        out.extend_from_slice(info.not_after.as_bytes());
        out.extend_from_slice(&info.attestation_challenge);
        out.extend_from_slice(spki);
        let sig = signer(&out)?;
        out.extend_from_slice(&sig);
        Ok(out)
    }
}

fn new_applet() -> KeymasterApplet {
    KeymasterApplet::new(
        kma_crypto_soft::implementation(),
        device::Implementation {
            keys: Box::new(TestKeys),
            cert: Box::new(TestCertAssembler),
        },
    )
}

fn command(applet: &mut KeymasterApplet, cla: i32, ins: i32, payload: Vec<u8>) -> Response {
    let cmd = Command { cla, ins, payload };
    let rsp = applet.process(&cmd.into_vec().unwrap());
    Response::from_slice(&rsp).unwrap()
}

/// Run a command, requiring overall success.
fn exec(applet: &mut KeymasterApplet, ins: Instruction, payload: Vec<u8>) -> Vec<u8> {
    let rsp = command(applet, APPLET_CLA, ins as i32, payload);
    assert_eq!(rsp.sw, SW_NO_ERROR, "unexpected SW for {:?}", ins);
    assert_eq!(rsp.error_code, ErrorCode::Ok as i32, "unexpected error for {:?}", ins);
    rsp.rsp
}

/// Run a command, requiring the given Keymaster error.
fn expect_error(
    applet: &mut KeymasterApplet,
    ins: Instruction,
    payload: Vec<u8>,
    code: ErrorCode,
) {
    let rsp = command(applet, APPLET_CLA, ins as i32, payload);
    assert_eq!(rsp.sw, SW_NO_ERROR, "unexpected SW for {:?}", ins);
    assert_eq!(rsp.error_code, code as i32, "unexpected error for {:?}", ins);
}

/// CBOR-encode a raw asymmetric key pair as `[priv, pub]`.
fn raw_pair(private: &[u8], public: &[u8]) -> Vec<u8> {
    let value = cbor::value::Value::Array(vec![
        cbor::value::Value::Bytes(private.to_vec()),
        cbor::value::Value::Bytes(public.to_vec()),
    ]);
    let mut data = Vec::new();
    cbor::ser::into_writer(&value, &mut data).unwrap();
    data
}

const PRESHARED_SECRET: [u8; 32] = [0x44; 32];

/// Run the full provisioning sequence except the final lock.
fn provision_unlocked(applet: &mut KeymasterApplet) {
    let priv_key = hex_decode(EC_PRIV_HEX).unwrap();
    let pub_key = hex_decode(EC_PUB_HEX).unwrap();
    exec(
        applet,
        Instruction::ProvisionAttestationKey,
        ProvisionAttestationKeyRequest {
            key_format: KeyFormat::Raw,
            key_data: raw_pair(&priv_key, &pub_key),
            params: vec![
                KeyParam::Algorithm(Algorithm::Ec),
                KeyParam::EcCurve(EcCurve::P256),
            ],
        }
        .into_vec()
        .unwrap(),
    );
    exec(
        applet,
        Instruction::ProvisionAttestationCertChain,
        ProvisionAttestationCertChainRequest { data: b"test-cert-chain".to_vec(), complete: true }
            .into_vec()
            .unwrap(),
    );
    exec(
        applet,
        Instruction::ProvisionAttestationCertParams,
        ProvisionAttestationCertParamsRequest {
            issuer: b"test-issuer".to_vec(),
            expiry_ms: 4_102_444_800_000, // 2100-01-01
            auth_key_id: vec![0x11; 20],
        }
        .into_vec()
        .unwrap(),
    );
    exec(
        applet,
        Instruction::ProvisionAttestationIds,
        ProvisionAttestationIdsRequest {
            ids: vec![KeyParam::AttestationIdBrand(b"Pixel".to_vec())],
        }
        .into_vec()
        .unwrap(),
    );
    exec(
        applet,
        Instruction::ProvisionSharedSecret,
        ProvisionSharedSecretRequest { secret: PRESHARED_SECRET.to_vec() }.into_vec().unwrap(),
    );
    set_boot(applet, 11, 202203);
}

fn set_boot(applet: &mut KeymasterApplet, os_version: u32, os_patchlevel: u32) {
    exec(
        applet,
        Instruction::SetBootParams,
        SetBootParamsRequest {
            os_version,
            os_patchlevel,
            verified_boot_key: vec![1; 32],
            verified_boot_hash: vec![2; 32],
            boot_state: VerifiedBootState::Verified,
            device_locked: true,
        }
        .into_vec()
        .unwrap(),
    );
}

/// A fully provisioned, locked, active applet.
fn active_applet() -> KeymasterApplet {
    let mut applet = new_applet();
    provision_unlocked(&mut applet);
    exec(&mut applet, Instruction::LockProvisioning, Vec::new());
    applet
}

fn generate_key(applet: &mut KeymasterApplet, params: Vec<KeyParam>) -> KeyCreationResponse {
    let rsp = exec(
        applet,
        Instruction::GenerateKey,
        GenerateKeyRequest { params }.into_vec().unwrap(),
    );
    KeyCreationResponse::from_slice(&rsp).unwrap()
}

fn begin(
    applet: &mut KeymasterApplet,
    purpose: KeyPurpose,
    key_blob: &[u8],
    params: Vec<KeyParam>,
) -> BeginResponse {
    let rsp = exec(
        applet,
        Instruction::BeginOperation,
        BeginRequest { purpose, key_blob: key_blob.to_vec(), params, auth_token: None }
            .into_vec()
            .unwrap(),
    );
    BeginResponse::from_slice(&rsp).unwrap()
}

fn update(
    applet: &mut KeymasterApplet,
    op_handle: i64,
    params: Vec<KeyParam>,
    input: &[u8],
) -> UpdateResponse {
    let rsp = exec(
        applet,
        Instruction::UpdateOperation,
        UpdateRequest {
            op_handle,
            params,
            input: input.to_vec(),
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
    );
    UpdateResponse::from_slice(&rsp).unwrap()
}

fn finish(
    applet: &mut KeymasterApplet,
    op_handle: i64,
    input: &[u8],
    signature: &[u8],
) -> FinishResponse {
    let rsp = exec(
        applet,
        Instruction::FinishOperation,
        FinishRequest {
            op_handle,
            params: Vec::new(),
            input: input.to_vec(),
            signature: signature.to_vec(),
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
    );
    FinishResponse::from_slice(&rsp).unwrap()
}

fn aes_gcm_key_params() -> Vec<KeyParam> {
    vec![
        KeyParam::Algorithm(Algorithm::Aes),
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::Purpose(KeyPurpose::Encrypt),
        KeyParam::Purpose(KeyPurpose::Decrypt),
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::Padding(PaddingMode::None),
        KeyParam::MinMacLength(96),
        KeyParam::NoAuthRequired,
    ]
}

fn gcm_begin_params() -> Vec<KeyParam> {
    vec![
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::Padding(PaddingMode::None),
        KeyParam::MacLength(128),
    ]
}

/// Negotiate the shared HMAC key with the applet, then derive the same key on
/// this side of the wire so tests can mint tokens the applet will accept.
fn negotiate_hmac_key(applet: &mut KeymasterApplet) -> Vec<u8> {
    let rsp = exec(applet, Instruction::GetHmacSharingParams, Vec::new());
    let params = GetHmacSharingParamsResponse::from_slice(&rsp).unwrap().params;
    exec(
        applet,
        Instruction::ComputeSharedHmac,
        ComputeSharedHmacRequest { params: vec![params.clone()] }.into_vec().unwrap(),
    );
    let mut context = params.seed.clone();
    context.extend_from_slice(&params.nonce);
    SoftAesCmac
        .ckdf(
            &aes::Key::Aes256(PRESHARED_SECRET),
            KEY_AGREEMENT_LABEL.as_bytes(),
            &[&context],
            32,
        )
        .unwrap()
}

/// Build a hardware auth token MACed under the negotiated HMAC key.
fn mint_auth_token(
    hmac_key: &[u8],
    challenge: i64,
    user_id: i64,
    timestamp_ms: i64,
) -> HardwareAuthToken {
    let authenticator_id = 0i64;
    let authenticator_type = HardwareAuthenticatorType::Password;
    let mut msg = vec![0u8];
    msg.extend_from_slice(&challenge.to_le_bytes());
    msg.extend_from_slice(&user_id.to_le_bytes());
    msg.extend_from_slice(&authenticator_id.to_le_bytes());
    msg.extend_from_slice(&(authenticator_type as i32).to_be_bytes());
    msg.extend_from_slice(&timestamp_ms.to_be_bytes());
    let mac = hmac_sha256(&SoftHmac, hmac_key, &[&msg]).unwrap();
    HardwareAuthToken {
        challenge,
        user_id,
        authenticator_id,
        authenticator_type,
        timestamp: Timestamp { milliseconds: timestamp_ms },
        mac,
    }
}

/// Build a verification token MACed under the negotiated HMAC key.
fn mint_verification_token(
    hmac_key: &[u8],
    challenge: i64,
    timestamp_ms: i64,
) -> VerificationToken {
    let security_level = SecurityLevel::Strongbox;
    let mut msg = AUTH_VERIFICATION_LABEL.as_bytes().to_vec();
    msg.extend_from_slice(&challenge.to_be_bytes());
    msg.extend_from_slice(&timestamp_ms.to_be_bytes());
    msg.extend_from_slice(&(security_level as i32).to_be_bytes());
    let mac = hmac_sha256(&SoftHmac, hmac_key, &[&msg]).unwrap();
    VerificationToken {
        challenge,
        timestamp: Timestamp { milliseconds: timestamp_ms },
        parameters_verified: Vec::new(),
        security_level,
        mac,
    }
}

fn begin_with_token(
    applet: &mut KeymasterApplet,
    purpose: KeyPurpose,
    key_blob: &[u8],
    params: Vec<KeyParam>,
    auth_token: HardwareAuthToken,
) -> BeginResponse {
    let rsp = exec(
        applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose,
            key_blob: key_blob.to_vec(),
            params,
            auth_token: Some(auth_token),
        }
        .into_vec()
        .unwrap(),
    );
    BeginResponse::from_slice(&rsp).unwrap()
}

fn nonce_of(rsp: &BeginResponse) -> Vec<u8> {
    rsp.out_params
        .iter()
        .find_map(|p| match p {
            KeyParam::Nonce(n) => Some(n.clone()),
            _ => None,
        })
        .expect("no nonce in begin response")
}

#[test]
fn test_command_framing() {
    let mut applet = active_applet();

    let rsp = command(&mut applet, 0x00, Instruction::GetHwInfo as i32, Vec::new());
    assert_eq!(rsp.sw, SW_CLA_NOT_SUPPORTED);

    let rsp = command(&mut applet, APPLET_CLA, 0x7f, Vec::new());
    assert_eq!(rsp.sw, SW_INS_NOT_SUPPORTED);

    // Not a CBOR command frame at all.
    let rsp = applet.process(&[0x01, 0x02, 0x03]);
    let rsp = Response::from_slice(&rsp).unwrap();
    assert_eq!(rsp.sw, SW_WRONG_DATA);

    // A valid frame whose payload is not the expected request type.
    let rsp = command(
        &mut applet,
        APPLET_CLA,
        Instruction::GenerateKey as i32,
        vec![0x01, 0x02, 0x03],
    );
    assert_eq!(rsp.sw, SW_WRONG_DATA);
}

#[test]
fn test_lifecycle_phases() {
    let mut applet = new_applet();

    // Operational commands are not available while provisioning.
    let rsp = command(
        &mut applet,
        APPLET_CLA,
        Instruction::GenerateKey as i32,
        GenerateKeyRequest { params: aes_gcm_key_params() }.into_vec().unwrap(),
    );
    assert_eq!(rsp.sw, SW_CONDITIONS_NOT_SATISFIED);

    // Locking requires everything to be provisioned first.
    expect_error(
        &mut applet,
        Instruction::LockProvisioning,
        Vec::new(),
        ErrorCode::InvalidArgument,
    );

    provision_unlocked(&mut applet);
    let rsp = exec(&mut applet, Instruction::GetProvisionStatus, Vec::new());
    let status = GetProvisionStatusResponse::from_slice(&rsp).unwrap().status;
    assert_eq!(status & PROVISION_STATUS_ATTESTATION_KEY, PROVISION_STATUS_ATTESTATION_KEY);
    assert_eq!(status & PROVISION_STATUS_PROVISIONING_LOCKED, 0);

    exec(&mut applet, Instruction::LockProvisioning, Vec::new());

    // Provisioning commands are gone, except boot params and status.
    let rsp = command(
        &mut applet,
        APPLET_CLA,
        Instruction::ProvisionSharedSecret as i32,
        ProvisionSharedSecretRequest { secret: PRESHARED_SECRET.to_vec() }.into_vec().unwrap(),
    );
    assert_eq!(rsp.sw, SW_CONDITIONS_NOT_SATISFIED);

    let rsp = exec(&mut applet, Instruction::GetProvisionStatus, Vec::new());
    let status = GetProvisionStatusResponse::from_slice(&rsp).unwrap().status;
    assert_eq!(status & PROVISION_STATUS_PROVISIONING_LOCKED, PROVISION_STATUS_PROVISIONING_LOCKED);

    set_boot(&mut applet, 11, 202203);
}

#[test]
fn test_add_rng_entropy() {
    let mut applet = active_applet();
    exec(
        &mut applet,
        Instruction::AddRngEntropy,
        AddRngEntropyRequest { data: vec![0xaa; 64] }.into_vec().unwrap(),
    );
    expect_error(
        &mut applet,
        Instruction::AddRngEntropy,
        AddRngEntropyRequest { data: vec![0xaa; 2049] }.into_vec().unwrap(),
        ErrorCode::InvalidInputLength,
    );
}

#[test]
fn test_generate_key_characteristics() {
    let mut applet = active_applet();
    let key = generate_key(&mut applet, aes_gcm_key_params());
    assert!(!key.key_blob.is_empty());
    let hw = &key.characteristics.hw_enforced;
    assert!(hw.contains(&KeyParam::Origin(KeyOrigin::Generated)));
    assert!(hw.contains(&KeyParam::KeySize(KeySizeInBits(256))));
    assert!(hw.contains(&KeyParam::OsVersion(11)));
    assert!(hw.contains(&KeyParam::OsPatchlevel(202203)));
}

#[test]
fn test_generate_key_unsupported_sizes() {
    let mut applet = active_applet();
    expect_error(
        &mut applet,
        Instruction::GenerateKey,
        GenerateKeyRequest {
            params: vec![
                KeyParam::Algorithm(Algorithm::Rsa),
                KeyParam::KeySize(KeySizeInBits(3072)),
                KeyParam::RsaPublicExponent(RsaExponent(65537)),
                KeyParam::Purpose(KeyPurpose::Sign),
                KeyParam::NoAuthRequired,
            ],
        }
        .into_vec()
        .unwrap(),
        ErrorCode::UnsupportedKeySize,
    );
    expect_error(
        &mut applet,
        Instruction::GenerateKey,
        GenerateKeyRequest {
            params: vec![
                KeyParam::Algorithm(Algorithm::Ec),
                KeyParam::EcCurve(EcCurve::P384),
                KeyParam::Purpose(KeyPurpose::Sign),
                KeyParam::NoAuthRequired,
            ],
        }
        .into_vec()
        .unwrap(),
        ErrorCode::UnsupportedEcCurve,
    );
}

#[test]
fn test_aes_gcm_round_trip() {
    let mut applet = active_applet();
    let key = generate_key(&mut applet, aes_gcm_key_params());
    let plaintext = b"The quick brown fox jumps over the lazy dog";
    let aad = b"header data";

    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
    let nonce = nonce_of(&rsp);
    assert_eq!(nonce.len(), 12);
    let mut ciphertext = Vec::new();
    let upd = update(
        &mut applet,
        rsp.op_handle,
        vec![KeyParam::AssociatedData(aad.to_vec())],
        &plaintext[..10],
    );
    assert_eq!(upd.input_consumed, 10);
    ciphertext.extend_from_slice(&upd.output);
    let fin = finish(&mut applet, rsp.op_handle, &plaintext[10..], &[]);
    ciphertext.extend_from_slice(&fin.output);
    // Ciphertext plus the 128-bit tag.
    assert_eq!(ciphertext.len(), plaintext.len() + 16);

    let mut params = gcm_begin_params();
    params.push(KeyParam::Nonce(nonce));
    let rsp = begin(&mut applet, KeyPurpose::Decrypt, &key.key_blob, params);
    let mut recovered = Vec::new();
    let upd = update(
        &mut applet,
        rsp.op_handle,
        vec![KeyParam::AssociatedData(aad.to_vec())],
        &ciphertext,
    );
    recovered.extend_from_slice(&upd.output);
    let fin = finish(&mut applet, rsp.op_handle, &[], &[]);
    recovered.extend_from_slice(&fin.output);
    assert_eq!(recovered, plaintext);
}

#[test]
fn test_aes_gcm_aad_after_data() {
    let mut applet = active_applet();
    let key = generate_key(&mut applet, aes_gcm_key_params());
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
    update(&mut applet, rsp.op_handle, Vec::new(), b"data first");
    expect_error(
        &mut applet,
        Instruction::UpdateOperation,
        UpdateRequest {
            op_handle: rsp.op_handle,
            params: vec![KeyParam::AssociatedData(b"too late".to_vec())],
            input: Vec::new(),
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::InvalidTag,
    );
    // The failed update killed the operation.
    expect_error(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
        ErrorCode::InvalidOperationHandle,
    );
}

#[test]
fn test_hmac_sign_and_verify() {
    let mut applet = active_applet();
    let key = generate_key(
        &mut applet,
        vec![
            KeyParam::Algorithm(Algorithm::Hmac),
            KeyParam::KeySize(KeySizeInBits(256)),
            KeyParam::Purpose(KeyPurpose::Sign),
            KeyParam::Purpose(KeyPurpose::Verify),
            KeyParam::Digest(Digest::Sha256),
            KeyParam::MinMacLength(96),
            KeyParam::NoAuthRequired,
        ],
    );
    let message = b"message to authenticate";

    // A MAC length is mandatory when signing.
    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Sign,
            key_blob: key.key_blob.clone(),
            params: Vec::new(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::MissingMacLength,
    );

    let rsp = begin(
        &mut applet,
        KeyPurpose::Sign,
        &key.key_blob,
        vec![KeyParam::MacLength(256)],
    );
    let mac = finish(&mut applet, rsp.op_handle, message, &[]).output;
    assert_eq!(mac.len(), 32);

    // Truncation to the requested length.
    let rsp = begin(
        &mut applet,
        KeyPurpose::Sign,
        &key.key_blob,
        vec![KeyParam::MacLength(96)],
    );
    let short_mac = finish(&mut applet, rsp.op_handle, message, &[]).output;
    assert_eq!(short_mac, mac[..12].to_vec());

    let rsp = begin(&mut applet, KeyPurpose::Verify, &key.key_blob, Vec::new());
    let fin = finish(&mut applet, rsp.op_handle, message, &mac);
    assert!(fin.output.is_empty());

    let mut bad_mac = mac.clone();
    bad_mac[0] ^= 0x01;
    let rsp = begin(&mut applet, KeyPurpose::Verify, &key.key_blob, Vec::new());
    expect_error(
        &mut applet,
        Instruction::FinishOperation,
        FinishRequest {
            op_handle: rsp.op_handle,
            params: Vec::new(),
            input: message.to_vec(),
            signature: bad_mac,
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::VerificationFailed,
    );
}

#[test]
fn test_ec_sign() {
    let mut applet = active_applet();
    let key = generate_key(
        &mut applet,
        vec![
            KeyParam::Algorithm(Algorithm::Ec),
            KeyParam::EcCurve(EcCurve::P256),
            KeyParam::Purpose(KeyPurpose::Sign),
            KeyParam::Digest(Digest::Sha256),
            KeyParam::NoAuthRequired,
        ],
    );
    // Curve and key size were deduced into the characteristics.
    assert!(key.characteristics.hw_enforced.contains(&KeyParam::KeySize(KeySizeInBits(256))));

    let rsp = begin(
        &mut applet,
        KeyPurpose::Sign,
        &key.key_blob,
        vec![KeyParam::Digest(Digest::Sha256)],
    );
    update(&mut applet, rsp.op_handle, Vec::new(), b"signed ");
    let sig = finish(&mut applet, rsp.op_handle, b"data", &[]).output;
    // DER-encoded ECDSA signature.
    assert_eq!(sig[0], 0x30);
}

#[test]
fn test_rsa_sign() {
    let mut applet = active_applet();
    let key = generate_key(
        &mut applet,
        vec![
            KeyParam::Algorithm(Algorithm::Rsa),
            KeyParam::KeySize(KeySizeInBits(2048)),
            KeyParam::RsaPublicExponent(RsaExponent(65537)),
            KeyParam::Purpose(KeyPurpose::Sign),
            KeyParam::Padding(PaddingMode::RsaPkcs115Sign),
            KeyParam::Digest(Digest::Sha256),
            KeyParam::NoAuthRequired,
        ],
    );
    let rsp = begin(
        &mut applet,
        KeyPurpose::Sign,
        &key.key_blob,
        vec![
            KeyParam::Padding(PaddingMode::RsaPkcs115Sign),
            KeyParam::Digest(Digest::Sha256),
        ],
    );
    let sig = finish(&mut applet, rsp.op_handle, b"to be signed", &[]).output;
    assert_eq!(sig.len(), 256);
}

#[test]
fn test_operation_slots_and_handles() {
    let mut applet = active_applet();
    let key = generate_key(&mut applet, aes_gcm_key_params());

    expect_error(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: 0x1234 }.into_vec().unwrap(),
        ErrorCode::InvalidOperationHandle,
    );

    let mut handles = Vec::new();
    for _i in 0..4 {
        handles.push(begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params()));
    }
    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::TooManyOperations,
    );

    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: handles[0].op_handle }.into_vec().unwrap(),
    );
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());

    // Finishing releases the slot; the handle is then dead.
    finish(&mut applet, rsp.op_handle, b"0123456789abcdef", &[]);
    expect_error(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
        ErrorCode::InvalidOperationHandle,
    );
}

#[test]
fn test_max_uses_per_boot() {
    let mut applet = active_applet();
    let mut params = aes_gcm_key_params();
    params.push(KeyParam::MaxUsesPerBoot(2));
    let key = generate_key(&mut applet, params);

    for _i in 0..2 {
        let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
        exec(
            &mut applet,
            Instruction::AbortOperation,
            AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
        );
    }
    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::KeyMaxOpsExceeded,
    );

    // A new boot resets the counters.
    set_boot(&mut applet, 11, 202203);
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
    );
}

#[test]
fn test_auth_bound_key_needs_token() {
    let mut applet = active_applet();
    let mut params = aes_gcm_key_params();
    params.retain(|p| *p != KeyParam::NoAuthRequired);
    params.push(KeyParam::UserSecureId(42));
    params.push(KeyParam::AuthTimeout(60));
    let key = generate_key(&mut applet, params);

    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::KeyUserNotAuthenticated,
    );
}

#[test]
fn test_auth_timeout_needs_verification_token() {
    let mut applet = active_applet();
    let hmac_key = negotiate_hmac_key(&mut applet);
    let mut params = aes_gcm_key_params();
    params.retain(|p| *p != KeyParam::NoAuthRequired);
    params.push(KeyParam::UserSecureId(42));
    params.push(KeyParam::AuthTimeout(1));
    let key = generate_key(&mut applet, params);
    let auth_token = mint_auth_token(&hmac_key, 0, 42, 1000);

    // Every update and finish on a timeout-bound key must carry a
    // verification token; omitting it is not a pass.
    let rsp = begin_with_token(
        &mut applet,
        KeyPurpose::Encrypt,
        &key.key_blob,
        gcm_begin_params(),
        auth_token.clone(),
    );
    expect_error(
        &mut applet,
        Instruction::FinishOperation,
        FinishRequest {
            op_handle: rsp.op_handle,
            params: Vec::new(),
            input: b"data".to_vec(),
            signature: Vec::new(),
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::VerificationFailed,
    );

    let rsp = begin_with_token(
        &mut applet,
        KeyPurpose::Encrypt,
        &key.key_blob,
        gcm_begin_params(),
        auth_token.clone(),
    );
    expect_error(
        &mut applet,
        Instruction::UpdateOperation,
        UpdateRequest {
            op_handle: rsp.op_handle,
            params: Vec::new(),
            input: b"data".to_vec(),
            auth_token: None,
            verification_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::VerificationFailed,
    );
    // The failed update killed the operation.
    expect_error(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
        ErrorCode::InvalidOperationHandle,
    );

    // A token timestamped outside the one-second window is too late.
    let rsp = begin_with_token(
        &mut applet,
        KeyPurpose::Encrypt,
        &key.key_blob,
        gcm_begin_params(),
        auth_token.clone(),
    );
    expect_error(
        &mut applet,
        Instruction::FinishOperation,
        FinishRequest {
            op_handle: rsp.op_handle,
            params: Vec::new(),
            input: b"data".to_vec(),
            signature: Vec::new(),
            auth_token: None,
            verification_token: Some(mint_verification_token(&hmac_key, rsp.op_handle, 3000)),
        }
        .into_vec()
        .unwrap(),
        ErrorCode::KeyUserNotAuthenticated,
    );

    // Inside the window the operation goes through.
    let rsp = begin_with_token(
        &mut applet,
        KeyPurpose::Encrypt,
        &key.key_blob,
        gcm_begin_params(),
        auth_token,
    );
    let rsp_bytes = exec(
        &mut applet,
        Instruction::FinishOperation,
        FinishRequest {
            op_handle: rsp.op_handle,
            params: Vec::new(),
            input: b"data".to_vec(),
            signature: Vec::new(),
            auth_token: None,
            verification_token: Some(mint_verification_token(&hmac_key, rsp.op_handle, 1500)),
        }
        .into_vec()
        .unwrap(),
    );
    let fin = FinishResponse::from_slice(&rsp_bytes).unwrap();
    // Ciphertext plus the 128-bit tag.
    assert_eq!(fin.output.len(), 4 + 16);
}

#[test]
fn test_device_locked_and_unlock() {
    let mut applet = active_applet();
    let hmac_key = negotiate_hmac_key(&mut applet);
    let mut params = aes_gcm_key_params();
    params.push(KeyParam::UnlockedDeviceRequired);
    let key = generate_key(&mut applet, params);

    // Usable while the device is unlocked.
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
    );

    exec(
        &mut applet,
        Instruction::DeviceLocked,
        DeviceLockedRequest {
            password_only: false,
            verification_token: Some(mint_verification_token(&hmac_key, 0, 1000)),
        }
        .into_vec()
        .unwrap(),
    );

    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::DeviceLocked,
    );

    // An auth token from before the lock does not unlock anything.
    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: Some(mint_auth_token(&hmac_key, 0, 1, 500)),
        }
        .into_vec()
        .unwrap(),
        ErrorCode::DeviceLocked,
    );

    // A fresh one does, and the unlock sticks.
    let rsp = begin_with_token(
        &mut applet,
        KeyPurpose::Encrypt,
        &key.key_blob,
        gcm_begin_params(),
        mint_auth_token(&hmac_key, 0, 1, 2000),
    );
    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
    );
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, gcm_begin_params());
    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
    );
}

#[test]
fn test_key_blob_binding() {
    let mut applet = active_applet();
    let mut params = aes_gcm_key_params();
    params.push(KeyParam::ApplicationId(b"app1".to_vec()));
    let key = generate_key(&mut applet, params);

    // The blob is unreadable without the application id it was bound to.
    expect_error(
        &mut applet,
        Instruction::GetKeyCharacteristics,
        GetKeyCharacteristicsRequest {
            key_blob: key.key_blob.clone(),
            app_id: Vec::new(),
            app_data: Vec::new(),
        }
        .into_vec()
        .unwrap(),
        ErrorCode::InvalidKeyBlob,
    );

    let rsp = exec(
        &mut applet,
        Instruction::GetKeyCharacteristics,
        GetKeyCharacteristicsRequest {
            key_blob: key.key_blob.clone(),
            app_id: b"app1".to_vec(),
            app_data: Vec::new(),
        }
        .into_vec()
        .unwrap(),
    );
    let chars = GetKeyCharacteristicsResponse::from_slice(&rsp).unwrap().characteristics;
    assert!(chars.hw_enforced.contains(&KeyParam::KeySize(KeySizeInBits(256))));

    // A corrupted blob never decrypts.
    let mut mangled = key.key_blob.clone();
    let last = mangled.len() - 1;
    mangled[last] ^= 0x01;
    expect_error(
        &mut applet,
        Instruction::GetKeyCharacteristics,
        GetKeyCharacteristicsRequest {
            key_blob: mangled,
            app_id: b"app1".to_vec(),
            app_data: Vec::new(),
        }
        .into_vec()
        .unwrap(),
        ErrorCode::InvalidKeyBlob,
    );
}

#[test]
fn test_key_upgrade() {
    let mut applet = active_applet();
    let key = generate_key(&mut applet, aes_gcm_key_params());

    // Same versions: upgrade is a no-op signalled by an empty blob.
    let rsp = exec(
        &mut applet,
        Instruction::UpgradeKey,
        UpgradeKeyRequest { key_blob: key.key_blob.clone(), upgrade_params: Vec::new() }
            .into_vec()
            .unwrap(),
    );
    assert!(UpgradeKeyResponse::from_slice(&rsp).unwrap().key_blob.is_empty());

    // A system update makes the old blob unusable until upgraded.
    set_boot(&mut applet, 11, 202204);
    expect_error(
        &mut applet,
        Instruction::BeginOperation,
        BeginRequest {
            purpose: KeyPurpose::Encrypt,
            key_blob: key.key_blob.clone(),
            params: gcm_begin_params(),
            auth_token: None,
        }
        .into_vec()
        .unwrap(),
        ErrorCode::KeyRequiresUpgrade,
    );
    let rsp = exec(
        &mut applet,
        Instruction::UpgradeKey,
        UpgradeKeyRequest { key_blob: key.key_blob.clone(), upgrade_params: Vec::new() }
            .into_vec()
            .unwrap(),
    );
    let upgraded = UpgradeKeyResponse::from_slice(&rsp).unwrap().key_blob;
    assert!(!upgraded.is_empty());
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &upgraded, gcm_begin_params());
    exec(
        &mut applet,
        Instruction::AbortOperation,
        AbortRequest { op_handle: rsp.op_handle }.into_vec().unwrap(),
    );

    // Versions never move backwards.
    set_boot(&mut applet, 11, 202203);
    expect_error(
        &mut applet,
        Instruction::UpgradeKey,
        UpgradeKeyRequest { key_blob: upgraded, upgrade_params: Vec::new() }.into_vec().unwrap(),
        ErrorCode::InvalidArgument,
    );
}

#[test]
fn test_import_aes_key() {
    let mut applet = active_applet();
    let raw_key = [0xa5u8; 16];
    let rsp = exec(
        &mut applet,
        Instruction::ImportKey,
        ImportKeyRequest {
            params: vec![
                KeyParam::Algorithm(Algorithm::Aes),
                KeyParam::Purpose(KeyPurpose::Encrypt),
                KeyParam::Purpose(KeyPurpose::Decrypt),
                KeyParam::BlockMode(BlockMode::Cbc),
                KeyParam::Padding(PaddingMode::Pkcs7),
                KeyParam::NoAuthRequired,
            ],
            key_format: KeyFormat::Raw,
            key_data: raw_key.to_vec(),
        }
        .into_vec()
        .unwrap(),
    );
    let key = KeyCreationResponse::from_slice(&rsp).unwrap();
    let hw = &key.characteristics.hw_enforced;
    assert!(hw.contains(&KeyParam::Origin(KeyOrigin::Imported)));
    assert!(hw.contains(&KeyParam::KeySize(KeySizeInBits(128))));

    // CBC/PKCS#7 round trip with the imported key.
    let cbc_params = vec![
        KeyParam::BlockMode(BlockMode::Cbc),
        KeyParam::Padding(PaddingMode::Pkcs7),
    ];
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, cbc_params.clone());
    let nonce = nonce_of(&rsp);
    let mut ciphertext = update(&mut applet, rsp.op_handle, Vec::new(), b"short message").output;
    ciphertext.extend_from_slice(&finish(&mut applet, rsp.op_handle, &[], &[]).output);
    assert_eq!(ciphertext.len(), 16);

    let mut params = cbc_params;
    params.push(KeyParam::Nonce(nonce));
    let rsp = begin(&mut applet, KeyPurpose::Decrypt, &key.key_blob, params);
    let recovered = finish(&mut applet, rsp.op_handle, &ciphertext, &[]).output;
    assert_eq!(recovered, b"short message");

    // A declared size that contradicts the key data is rejected.
    expect_error(
        &mut applet,
        Instruction::ImportKey,
        ImportKeyRequest {
            params: vec![
                KeyParam::Algorithm(Algorithm::Aes),
                KeyParam::KeySize(KeySizeInBits(256)),
                KeyParam::NoAuthRequired,
            ],
            key_format: KeyFormat::Raw,
            key_data: raw_key.to_vec(),
        }
        .into_vec()
        .unwrap(),
        ErrorCode::ImportParameterMismatch,
    );
}

#[test]
fn test_import_wrapped_key() {
    let mut applet = active_applet();
    let wrapping = generate_key(
        &mut applet,
        vec![
            KeyParam::Algorithm(Algorithm::Rsa),
            KeyParam::KeySize(KeySizeInBits(2048)),
            KeyParam::RsaPublicExponent(RsaExponent(65537)),
            KeyParam::Purpose(KeyPurpose::WrapKey),
            KeyParam::Padding(PaddingMode::RsaOaep),
            KeyParam::Digest(Digest::Sha256),
            KeyParam::NoAuthRequired,
        ],
    );
    // The public half of the wrapping key travels in clear in the blob.
    let spki = EncryptedKeyBlob::from_slice(&wrapping.key_blob)
        .unwrap()
        .public_key
        .expect("no public key in RSA key blob");
    let wrapping_pub = RsaPublicKey::from_public_key_der(&spki).unwrap();

    // Wrap a 128-bit AES key the way the host-side wrapped-key format does:
    // the key material sealed with AES-GCM under an ephemeral KEK, the KEK
    // masked and then OAEP-encrypted to the wrapping key.
    let raw_key = [0xa5u8; 16];
    let kek = [0x5au8; 32];
    let masking_key = [0x0fu8; 32];
    let mut transport_key = kek;
    for (b, m) in transport_key.iter_mut().zip(masking_key.iter()) {
        *b ^= m;
    }
    let encrypted_transport_key = wrapping_pub
        .encrypt(&mut OsRng, Oaep::new_with_mgf_hash::<Sha256, Sha1>(), &transport_key)
        .unwrap();

    let key_params = vec![
        KeyParam::Algorithm(Algorithm::Aes),
        KeyParam::KeySize(KeySizeInBits(128)),
        KeyParam::Purpose(KeyPurpose::Encrypt),
        KeyParam::Purpose(KeyPurpose::Decrypt),
        KeyParam::BlockMode(BlockMode::Cbc),
        KeyParam::Padding(PaddingMode::Pkcs7),
        KeyParam::NoAuthRequired,
    ];
    let aad = key_params.clone().into_vec().unwrap();
    let nonce = [0x42u8; 12];
    let sealed = Aes256Gcm::new_from_slice(&kek)
        .unwrap()
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: &raw_key, aad: &aad })
        .unwrap();
    let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

    let rsp = exec(
        &mut applet,
        Instruction::ImportWrappedKey,
        ImportWrappedKeyRequest {
            encrypted_key_data: ciphertext.to_vec(),
            tag: tag.to_vec(),
            nonce: nonce.to_vec(),
            encrypted_transport_key,
            key_format: KeyFormat::Raw,
            key_params: key_params.clone(),
            wrapping_key_blob: wrapping.key_blob.clone(),
            masking_key: masking_key.to_vec(),
            unwrapping_params: vec![
                KeyParam::Padding(PaddingMode::RsaOaep),
                KeyParam::Digest(Digest::Sha256),
            ],
            password_sid: 0,
            biometric_sid: 0,
        }
        .into_vec()
        .unwrap(),
    );
    let key = KeyCreationResponse::from_slice(&rsp).unwrap();
    let hw = &key.characteristics.hw_enforced;
    assert!(hw.contains(&KeyParam::Origin(KeyOrigin::SecurelyImported)));
    assert!(hw.contains(&KeyParam::KeySize(KeySizeInBits(128))));

    // The unwrapped key is usable for a CBC round trip.
    let cbc_params = vec![
        KeyParam::BlockMode(BlockMode::Cbc),
        KeyParam::Padding(PaddingMode::Pkcs7),
    ];
    let rsp = begin(&mut applet, KeyPurpose::Encrypt, &key.key_blob, cbc_params.clone());
    let cbc_nonce = nonce_of(&rsp);
    let ciphertext = finish(&mut applet, rsp.op_handle, b"wrapped data", &[]).output;
    let mut params = cbc_params;
    params.push(KeyParam::Nonce(cbc_nonce));
    let rsp = begin(&mut applet, KeyPurpose::Decrypt, &key.key_blob, params);
    let recovered = finish(&mut applet, rsp.op_handle, &ciphertext, &[]).output;
    assert_eq!(recovered, b"wrapped data");
}

#[test]
fn test_shared_secret_negotiation() {
    let mut alice = active_applet();
    let mut bob = active_applet();

    let rsp = exec(&mut alice, Instruction::GetHmacSharingParams, Vec::new());
    let alice_params = GetHmacSharingParamsResponse::from_slice(&rsp).unwrap().params;
    assert_eq!(alice_params.nonce.len(), 32);
    assert!(alice_params.seed.is_empty());
    let rsp = exec(&mut bob, Instruction::GetHmacSharingParams, Vec::new());
    let bob_params = GetHmacSharingParamsResponse::from_slice(&rsp).unwrap().params;

    // Omitting a party's own contribution fails the negotiation.
    expect_error(
        &mut alice,
        Instruction::ComputeSharedHmac,
        ComputeSharedHmacRequest { params: vec![bob_params.clone()] }.into_vec().unwrap(),
        ErrorCode::InvalidArgument,
    );

    let all = vec![alice_params, bob_params];
    let rsp = exec(
        &mut alice,
        Instruction::ComputeSharedHmac,
        ComputeSharedHmacRequest { params: all.clone() }.into_vec().unwrap(),
    );
    let alice_check = ComputeSharedHmacResponse::from_slice(&rsp).unwrap().sharing_check;
    let rsp = exec(
        &mut bob,
        Instruction::ComputeSharedHmac,
        ComputeSharedHmacRequest { params: all }.into_vec().unwrap(),
    );
    let bob_check = ComputeSharedHmacResponse::from_slice(&rsp).unwrap().sharing_check;
    // Both parties hold the same pre-shared secret, so the checks agree.
    assert_eq!(alice_check, bob_check);
    assert_eq!(alice_check.len(), 32);
}

#[test]
fn test_attest_key() {
    let mut applet = active_applet();
    let key = generate_key(
        &mut applet,
        vec![
            KeyParam::Algorithm(Algorithm::Ec),
            KeyParam::EcCurve(EcCurve::P256),
            KeyParam::Purpose(KeyPurpose::Sign),
            KeyParam::Digest(Digest::Sha256),
            KeyParam::NoAuthRequired,
        ],
    );

    expect_error(
        &mut applet,
        Instruction::AttestKey,
        AttestKeyRequest {
            key_blob: key.key_blob.clone(),
            attest_params: vec![KeyParam::AttestationApplicationId(b"com.example".to_vec())],
        }
        .into_vec()
        .unwrap(),
        ErrorCode::AttestationChallengeMissing,
    );

    let rsp = exec(
        &mut applet,
        Instruction::AttestKey,
        AttestKeyRequest {
            key_blob: key.key_blob.clone(),
            attest_params: vec![
                KeyParam::AttestationChallenge(b"challenge".to_vec()),
                KeyParam::AttestationApplicationId(b"com.example".to_vec()),
                KeyParam::AttestationIdBrand(b"Pixel".to_vec()),
            ],
        }
        .into_vec()
        .unwrap(),
    );
    let cert = AttestKeyResponse::from_slice(&rsp).unwrap().cert;
    assert!(cert.windows(9).any(|w| w == b"challenge"));
    assert!(cert.windows(11).any(|w| w == b"test-issuer"));

    // Attestation ids must match what was provisioned.
    expect_error(
        &mut applet,
        Instruction::AttestKey,
        AttestKeyRequest {
            key_blob: key.key_blob.clone(),
            attest_params: vec![
                KeyParam::AttestationChallenge(b"challenge".to_vec()),
                KeyParam::AttestationApplicationId(b"com.example".to_vec()),
                KeyParam::AttestationIdBrand(b"NotPixel".to_vec()),
            ],
        }
        .into_vec()
        .unwrap(),
        ErrorCode::CannotAttestIds,
    );

    // Symmetric keys cannot be attested.
    let aes_key = generate_key(&mut applet, aes_gcm_key_params());
    expect_error(
        &mut applet,
        Instruction::AttestKey,
        AttestKeyRequest {
            key_blob: aes_key.key_blob,
            attest_params: vec![
                KeyParam::AttestationChallenge(b"challenge".to_vec()),
                KeyParam::AttestationApplicationId(b"com.example".to_vec()),
            ],
        }
        .into_vec()
        .unwrap(),
        ErrorCode::IncompatibleAlgorithm,
    );

    let rsp = exec(&mut applet, Instruction::GetCertChain, Vec::new());
    let chain = GetCertChainResponse::from_slice(&rsp).unwrap().cert_chain;
    assert_eq!(chain, b"test-cert-chain");
}
