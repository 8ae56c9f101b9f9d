//! Types for the Keymaster HAL surface of the applet.

use crate::{cbor, cbor_type_error, try_from_n, AsCborValue, CborError, KeySizeInBits, RsaExponent};
use alloc::vec::Vec;
use enumn::N;
use kma_derive::AsCborValue;

/// Default maximum size for an attestation challenge.
pub const MAX_ATTESTATION_CHALLENGE_LEN: usize = 128;

/// Label prepended to the data signed by a trusted confirmation UI.
pub const CONFIRMATION_TOKEN_LABEL: &str = "confirmation token";

/// Label over which the verification token MAC is computed.
pub const AUTH_VERIFICATION_LABEL: &str = "Auth Verification";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum Algorithm {
    Rsa = 1,
    Ec = 3,
    Aes = 32,
    TripleDes = 33,
    Hmac = 128,
}
try_from_n!(Algorithm);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum BlockMode {
    Ecb = 1,
    Cbc = 2,
    Ctr = 3,
    Gcm = 32,
}
try_from_n!(BlockMode);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum PaddingMode {
    None = 1,
    RsaOaep = 2,
    RsaPss = 3,
    RsaPkcs115Encrypt = 4,
    RsaPkcs115Sign = 5,
    Pkcs7 = 64,
}
try_from_n!(PaddingMode);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, N, AsCborValue)]
#[repr(i32)]
pub enum Digest {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
}
try_from_n!(Digest);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum EcCurve {
    P224 = 0,
    P256 = 1,
    P384 = 2,
    P521 = 3,
}
try_from_n!(EcCurve);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum KeyOrigin {
    Generated = 0,
    Derived = 1,
    Imported = 2,
    Reserved = 3,
    SecurelyImported = 4,
}
try_from_n!(KeyOrigin);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum KeyPurpose {
    Encrypt = 0,
    Decrypt = 1,
    Sign = 2,
    Verify = 3,
    WrapKey = 5,
}
try_from_n!(KeyPurpose);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum KeyFormat {
    X509 = 0,
    Pkcs8 = 1,
    Raw = 3,
}
try_from_n!(KeyFormat);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum HardwareAuthenticatorType {
    None = 0,
    Password = 1,
    Fingerprint = 2,
    Any = -1,
}
try_from_n!(HardwareAuthenticatorType);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum SecurityLevel {
    Software = 0,
    TrustedEnvironment = 1,
    Strongbox = 2,
}
try_from_n!(SecurityLevel);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum VerifiedBootState {
    Verified = 0,
    SelfSigned = 1,
    Unverified = 2,
    Failed = 3,
}
try_from_n!(VerifiedBootState);

/// Keymaster error codes. These values travel on the wire; conformance suites
/// assert on exact codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N, AsCborValue)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    RootOfTrustAlreadySet = -1,
    UnsupportedPurpose = -2,
    IncompatiblePurpose = -3,
    UnsupportedAlgorithm = -4,
    IncompatibleAlgorithm = -5,
    UnsupportedKeySize = -6,
    UnsupportedBlockMode = -7,
    IncompatibleBlockMode = -8,
    UnsupportedMacLength = -9,
    UnsupportedPaddingMode = -10,
    IncompatiblePaddingMode = -11,
    UnsupportedDigest = -12,
    IncompatibleDigest = -13,
    InvalidExpirationTime = -14,
    InvalidUserId = -15,
    InvalidAuthorizationTimeout = -16,
    UnsupportedKeyFormat = -17,
    IncompatibleKeyFormat = -18,
    UnsupportedKeyEncryptionAlgorithm = -19,
    UnsupportedKeyVerificationAlgorithm = -20,
    InvalidInputLength = -21,
    KeyExportOptionsInvalid = -22,
    DelegationNotAllowed = -23,
    KeyNotYetValid = -24,
    KeyExpired = -25,
    KeyUserNotAuthenticated = -26,
    OutputParameterNull = -27,
    InvalidOperationHandle = -28,
    InsufficientBufferSpace = -29,
    VerificationFailed = -30,
    TooManyOperations = -31,
    UnexpectedNullPointer = -32,
    InvalidKeyBlob = -33,
    ImportedKeyNotEncrypted = -34,
    ImportedKeyDecryptionFailed = -35,
    ImportedKeyNotSigned = -36,
    ImportedKeyVerificationFailed = -37,
    InvalidArgument = -38,
    UnsupportedTag = -39,
    InvalidTag = -40,
    MemoryAllocationFailed = -41,
    ImportParameterMismatch = -44,
    SecureHwAccessDenied = -45,
    OperationCancelled = -46,
    ConcurrentAccessConflict = -47,
    SecureHwBusy = -48,
    SecureHwCommunicationFailed = -49,
    UnsupportedEcField = -50,
    MissingNonce = -51,
    InvalidNonce = -52,
    MissingMacLength = -53,
    KeyRateLimitExceeded = -54,
    CallerNonceProhibited = -55,
    KeyMaxOpsExceeded = -56,
    InvalidMacLength = -57,
    MissingMinMacLength = -58,
    UnsupportedMinMacLength = -59,
    UnsupportedKdf = -60,
    UnsupportedEcCurve = -61,
    KeyRequiresUpgrade = -62,
    AttestationChallengeMissing = -63,
    KeymasterNotConfigured = -64,
    AttestationApplicationIdMissing = -65,
    CannotAttestIds = -66,
    RollbackResistanceUnavailable = -67,
    HardwareTypeUnavailable = -68,
    ProofOfPresenceRequired = -69,
    ConcurrentProofOfPresenceRequested = -70,
    NoUserConfirmation = -71,
    DeviceLocked = -72,
    EarlyBootEnded = -73,
    AttestationKeysNotProvisioned = -74,
    AttestationIdsNotProvisioned = -75,
    InvalidOperation = -76,
    StorageKeyUnsupported = -77,
    IncompatibleMgfDigest = -78,
    UnsupportedMgfDigest = -79,
    MissingNotBefore = -80,
    MissingNotAfter = -81,
    HardwareNotYetAvailable = -85,
    Unimplemented = -100,
    VersionMismatch = -101,
    UnknownError = -1000,
}
try_from_n!(ErrorCode);

/// The tag type carried in the top nibble of a tag value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum TagType {
    Invalid = 0x00000000,
    Enum = 0x10000000,
    EnumRep = 0x20000000,
    Uint = 0x30000000,
    UintRep = 0x40000000,
    Ulong = 0x50000000,
    Date = 0x60000000,
    Bool = 0x70000000,
    Bignum = 0x80000000,
    Bytes = 0x90000000,
    UlongRep = 0xa0000000,
}

/// Key parameter tags, with the tag type encoded in the top nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, N)]
#[repr(u32)]
pub enum Tag {
    Invalid = 0,
    Purpose = 0x20000001,
    Algorithm = 0x10000002,
    KeySize = 0x30000003,
    BlockMode = 0x20000004,
    Digest = 0x20000005,
    Padding = 0x20000006,
    CallerNonce = 0x70000007,
    MinMacLength = 0x30000008,
    EcCurve = 0x1000000a,
    RsaPublicExponent = 0x500000c8,
    IncludeUniqueId = 0x700000ca,
    Nonce = 0x90000065,
    ActiveDatetime = 0x60000190,
    OriginationExpireDatetime = 0x60000191,
    UsageExpireDatetime = 0x60000192,
    MinSecondsBetweenOps = 0x30000193,
    MaxUsesPerBoot = 0x30000194,
    UserId = 0x300001f5,
    UserSecureId = 0xa00001f6,
    NoAuthRequired = 0x700001f7,
    UserAuthType = 0x100001f8,
    AuthTimeout = 0x300001f9,
    TrustedUserPresenceRequired = 0x700001fb,
    TrustedConfirmationRequired = 0x700001fc,
    UnlockedDeviceRequired = 0x700001fd,
    ApplicationId = 0x90000259,
    ApplicationData = 0x9000025a,
    CreationDatetime = 0x6000025b,
    Origin = 0x1000025c,
    RootOfTrust = 0x9000025f,
    OsVersion = 0x30000260,
    OsPatchlevel = 0x30000261,
    UniqueId = 0x90000262,
    AttestationChallenge = 0x90000263,
    AttestationApplicationId = 0x90000264,
    AttestationIdBrand = 0x90000265,
    AttestationIdDevice = 0x90000266,
    AttestationIdProduct = 0x90000267,
    AttestationIdSerial = 0x90000268,
    AttestationIdImei = 0x90000269,
    AttestationIdMeid = 0x9000026a,
    AttestationIdManufacturer = 0x9000026b,
    AttestationIdModel = 0x9000026c,
    AssociatedData = 0x900003e8,
    MacLength = 0x300003eb,
    ResetSinceIdRotation = 0x700003ec,
    ConfirmationToken = 0x900003ed,
}

/// Return the type of a tag.
pub fn tag_type(tag: Tag) -> TagType {
    TagType::n((tag as u32) & 0xf0000000).unwrap_or(TagType::Invalid)
}

/// A date/time value, expressed as milliseconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime {
    pub ms_since_epoch: i64,
}

impl AsCborValue for DateTime {
    fn from_cbor_value(value: cbor::value::Value) -> Result<Self, CborError> {
        Ok(Self { ms_since_epoch: <i64>::from_cbor_value(value)? })
    }
    fn to_cbor_value(self) -> Result<cbor::value::Value, CborError> {
        self.ms_since_epoch.to_cbor_value()
    }
}

/// A single key parameter: a tag together with its typed value. On the wire a
/// parameter is a 2-element CBOR array `[tag, value]`; a parameter set is an
/// array of these, re-encoded deterministically in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyParam {
    Purpose(KeyPurpose),
    Algorithm(Algorithm),
    KeySize(KeySizeInBits),
    BlockMode(BlockMode),
    Digest(Digest),
    Padding(PaddingMode),
    CallerNonce,
    MinMacLength(u32),
    EcCurve(EcCurve),
    RsaPublicExponent(RsaExponent),
    IncludeUniqueId,
    Nonce(Vec<u8>),
    ActiveDatetime(DateTime),
    OriginationExpireDatetime(DateTime),
    UsageExpireDatetime(DateTime),
    MinSecondsBetweenOps(u32),
    MaxUsesPerBoot(u32),
    UserId(u32),
    UserSecureId(u64),
    NoAuthRequired,
    UserAuthType(u32),
    AuthTimeout(u32),
    TrustedUserPresenceRequired,
    TrustedConfirmationRequired,
    UnlockedDeviceRequired,
    ApplicationId(Vec<u8>),
    ApplicationData(Vec<u8>),
    CreationDatetime(DateTime),
    Origin(KeyOrigin),
    RootOfTrust(Vec<u8>),
    OsVersion(u32),
    OsPatchlevel(u32),
    UniqueId(Vec<u8>),
    AttestationChallenge(Vec<u8>),
    AttestationApplicationId(Vec<u8>),
    AttestationIdBrand(Vec<u8>),
    AttestationIdDevice(Vec<u8>),
    AttestationIdProduct(Vec<u8>),
    AttestationIdSerial(Vec<u8>),
    AttestationIdImei(Vec<u8>),
    AttestationIdMeid(Vec<u8>),
    AttestationIdManufacturer(Vec<u8>),
    AttestationIdModel(Vec<u8>),
    AssociatedData(Vec<u8>),
    MacLength(u32),
    ResetSinceIdRotation,
    ConfirmationToken(Vec<u8>),
}

impl KeyParam {
    /// The tag associated with this parameter's value.
    pub fn tag(&self) -> Tag {
        match self {
            KeyParam::Purpose(_) => Tag::Purpose,
            KeyParam::Algorithm(_) => Tag::Algorithm,
            KeyParam::KeySize(_) => Tag::KeySize,
            KeyParam::BlockMode(_) => Tag::BlockMode,
            KeyParam::Digest(_) => Tag::Digest,
            KeyParam::Padding(_) => Tag::Padding,
            KeyParam::CallerNonce => Tag::CallerNonce,
            KeyParam::MinMacLength(_) => Tag::MinMacLength,
            KeyParam::EcCurve(_) => Tag::EcCurve,
            KeyParam::RsaPublicExponent(_) => Tag::RsaPublicExponent,
            KeyParam::IncludeUniqueId => Tag::IncludeUniqueId,
            KeyParam::Nonce(_) => Tag::Nonce,
            KeyParam::ActiveDatetime(_) => Tag::ActiveDatetime,
            KeyParam::OriginationExpireDatetime(_) => Tag::OriginationExpireDatetime,
            KeyParam::UsageExpireDatetime(_) => Tag::UsageExpireDatetime,
            KeyParam::MinSecondsBetweenOps(_) => Tag::MinSecondsBetweenOps,
            KeyParam::MaxUsesPerBoot(_) => Tag::MaxUsesPerBoot,
            KeyParam::UserId(_) => Tag::UserId,
            KeyParam::UserSecureId(_) => Tag::UserSecureId,
            KeyParam::NoAuthRequired => Tag::NoAuthRequired,
            KeyParam::UserAuthType(_) => Tag::UserAuthType,
            KeyParam::AuthTimeout(_) => Tag::AuthTimeout,
            KeyParam::TrustedUserPresenceRequired => Tag::TrustedUserPresenceRequired,
            KeyParam::TrustedConfirmationRequired => Tag::TrustedConfirmationRequired,
            KeyParam::UnlockedDeviceRequired => Tag::UnlockedDeviceRequired,
            KeyParam::ApplicationId(_) => Tag::ApplicationId,
            KeyParam::ApplicationData(_) => Tag::ApplicationData,
            KeyParam::CreationDatetime(_) => Tag::CreationDatetime,
            KeyParam::Origin(_) => Tag::Origin,
            KeyParam::RootOfTrust(_) => Tag::RootOfTrust,
            KeyParam::OsVersion(_) => Tag::OsVersion,
            KeyParam::OsPatchlevel(_) => Tag::OsPatchlevel,
            KeyParam::UniqueId(_) => Tag::UniqueId,
            KeyParam::AttestationChallenge(_) => Tag::AttestationChallenge,
            KeyParam::AttestationApplicationId(_) => Tag::AttestationApplicationId,
            KeyParam::AttestationIdBrand(_) => Tag::AttestationIdBrand,
            KeyParam::AttestationIdDevice(_) => Tag::AttestationIdDevice,
            KeyParam::AttestationIdProduct(_) => Tag::AttestationIdProduct,
            KeyParam::AttestationIdSerial(_) => Tag::AttestationIdSerial,
            KeyParam::AttestationIdImei(_) => Tag::AttestationIdImei,
            KeyParam::AttestationIdMeid(_) => Tag::AttestationIdMeid,
            KeyParam::AttestationIdManufacturer(_) => Tag::AttestationIdManufacturer,
            KeyParam::AttestationIdModel(_) => Tag::AttestationIdModel,
            KeyParam::AssociatedData(_) => Tag::AssociatedData,
            KeyParam::MacLength(_) => Tag::MacLength,
            KeyParam::ResetSinceIdRotation => Tag::ResetSinceIdRotation,
            KeyParam::ConfirmationToken(_) => Tag::ConfirmationToken,
        }
    }
}

fn tag_value(tag: Tag) -> cbor::value::Value {
    cbor::value::Value::Integer((tag as u32).into())
}

impl AsCborValue for KeyParam {
    fn from_cbor_value(value: cbor::value::Value) -> Result<Self, CborError> {
        let mut a = match value {
            cbor::value::Value::Array(a) if a.len() == 2 => a,
            _ => return Err(CborError::UnexpectedItem("non-pair", "arr len 2")),
        };
        let raw = a.remove(1);
        let tag = <u32>::from_cbor_value(a.remove(0))?;
        let tag = Tag::n(tag).ok_or(CborError::NonEnumValue)?;

        Ok(match tag {
            Tag::Purpose => KeyParam::Purpose(KeyPurpose::from_cbor_value(raw)?),
            Tag::Algorithm => KeyParam::Algorithm(Algorithm::from_cbor_value(raw)?),
            Tag::KeySize => KeyParam::KeySize(KeySizeInBits::from_cbor_value(raw)?),
            Tag::BlockMode => KeyParam::BlockMode(BlockMode::from_cbor_value(raw)?),
            Tag::Digest => KeyParam::Digest(Digest::from_cbor_value(raw)?),
            Tag::Padding => KeyParam::Padding(PaddingMode::from_cbor_value(raw)?),
            Tag::CallerNonce => KeyParam::CallerNonce,
            Tag::MinMacLength => KeyParam::MinMacLength(<u32>::from_cbor_value(raw)?),
            Tag::EcCurve => KeyParam::EcCurve(EcCurve::from_cbor_value(raw)?),
            Tag::RsaPublicExponent => {
                KeyParam::RsaPublicExponent(RsaExponent::from_cbor_value(raw)?)
            }
            Tag::IncludeUniqueId => KeyParam::IncludeUniqueId,
            Tag::Nonce => KeyParam::Nonce(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::ActiveDatetime => KeyParam::ActiveDatetime(DateTime::from_cbor_value(raw)?),
            Tag::OriginationExpireDatetime => {
                KeyParam::OriginationExpireDatetime(DateTime::from_cbor_value(raw)?)
            }
            Tag::UsageExpireDatetime => {
                KeyParam::UsageExpireDatetime(DateTime::from_cbor_value(raw)?)
            }
            Tag::MinSecondsBetweenOps => {
                KeyParam::MinSecondsBetweenOps(<u32>::from_cbor_value(raw)?)
            }
            Tag::MaxUsesPerBoot => KeyParam::MaxUsesPerBoot(<u32>::from_cbor_value(raw)?),
            Tag::UserId => KeyParam::UserId(<u32>::from_cbor_value(raw)?),
            Tag::UserSecureId => KeyParam::UserSecureId(<u64>::from_cbor_value(raw)?),
            Tag::NoAuthRequired => KeyParam::NoAuthRequired,
            Tag::UserAuthType => KeyParam::UserAuthType(<u32>::from_cbor_value(raw)?),
            Tag::AuthTimeout => KeyParam::AuthTimeout(<u32>::from_cbor_value(raw)?),
            Tag::TrustedUserPresenceRequired => KeyParam::TrustedUserPresenceRequired,
            Tag::TrustedConfirmationRequired => KeyParam::TrustedConfirmationRequired,
            Tag::UnlockedDeviceRequired => KeyParam::UnlockedDeviceRequired,
            Tag::ApplicationId => KeyParam::ApplicationId(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::ApplicationData => KeyParam::ApplicationData(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::CreationDatetime => KeyParam::CreationDatetime(DateTime::from_cbor_value(raw)?),
            Tag::Origin => KeyParam::Origin(KeyOrigin::from_cbor_value(raw)?),
            Tag::RootOfTrust => KeyParam::RootOfTrust(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::OsVersion => KeyParam::OsVersion(<u32>::from_cbor_value(raw)?),
            Tag::OsPatchlevel => KeyParam::OsPatchlevel(<u32>::from_cbor_value(raw)?),
            Tag::UniqueId => KeyParam::UniqueId(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::AttestationChallenge => {
                KeyParam::AttestationChallenge(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationApplicationId => {
                KeyParam::AttestationApplicationId(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdBrand => {
                KeyParam::AttestationIdBrand(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdDevice => {
                KeyParam::AttestationIdDevice(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdProduct => {
                KeyParam::AttestationIdProduct(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdSerial => {
                KeyParam::AttestationIdSerial(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdImei => KeyParam::AttestationIdImei(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::AttestationIdMeid => KeyParam::AttestationIdMeid(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::AttestationIdManufacturer => {
                KeyParam::AttestationIdManufacturer(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AttestationIdModel => {
                KeyParam::AttestationIdModel(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::AssociatedData => KeyParam::AssociatedData(<Vec<u8>>::from_cbor_value(raw)?),
            Tag::MacLength => KeyParam::MacLength(<u32>::from_cbor_value(raw)?),
            Tag::ResetSinceIdRotation => KeyParam::ResetSinceIdRotation,
            Tag::ConfirmationToken => {
                KeyParam::ConfirmationToken(<Vec<u8>>::from_cbor_value(raw)?)
            }
            Tag::Invalid => return Err(CborError::NonEnumValue),
        })
    }

    fn to_cbor_value(self) -> Result<cbor::value::Value, CborError> {
        let tag = tag_value(self.tag());
        let val = match self {
            KeyParam::Purpose(v) => v.to_cbor_value()?,
            KeyParam::Algorithm(v) => v.to_cbor_value()?,
            KeyParam::KeySize(v) => v.to_cbor_value()?,
            KeyParam::BlockMode(v) => v.to_cbor_value()?,
            KeyParam::Digest(v) => v.to_cbor_value()?,
            KeyParam::Padding(v) => v.to_cbor_value()?,
            KeyParam::CallerNonce
            | KeyParam::IncludeUniqueId
            | KeyParam::NoAuthRequired
            | KeyParam::TrustedUserPresenceRequired
            | KeyParam::TrustedConfirmationRequired
            | KeyParam::UnlockedDeviceRequired
            | KeyParam::ResetSinceIdRotation => true.to_cbor_value()?,
            KeyParam::MinMacLength(v)
            | KeyParam::MinSecondsBetweenOps(v)
            | KeyParam::MaxUsesPerBoot(v)
            | KeyParam::UserId(v)
            | KeyParam::UserAuthType(v)
            | KeyParam::AuthTimeout(v)
            | KeyParam::OsVersion(v)
            | KeyParam::OsPatchlevel(v)
            | KeyParam::MacLength(v) => v.to_cbor_value()?,
            KeyParam::EcCurve(v) => v.to_cbor_value()?,
            KeyParam::RsaPublicExponent(v) => v.to_cbor_value()?,
            KeyParam::UserSecureId(v) => v.to_cbor_value()?,
            KeyParam::ActiveDatetime(v)
            | KeyParam::OriginationExpireDatetime(v)
            | KeyParam::UsageExpireDatetime(v)
            | KeyParam::CreationDatetime(v) => v.to_cbor_value()?,
            KeyParam::Origin(v) => v.to_cbor_value()?,
            KeyParam::Nonce(v)
            | KeyParam::ApplicationId(v)
            | KeyParam::ApplicationData(v)
            | KeyParam::RootOfTrust(v)
            | KeyParam::UniqueId(v)
            | KeyParam::AttestationChallenge(v)
            | KeyParam::AttestationApplicationId(v)
            | KeyParam::AttestationIdBrand(v)
            | KeyParam::AttestationIdDevice(v)
            | KeyParam::AttestationIdProduct(v)
            | KeyParam::AttestationIdSerial(v)
            | KeyParam::AttestationIdImei(v)
            | KeyParam::AttestationIdMeid(v)
            | KeyParam::AttestationIdManufacturer(v)
            | KeyParam::AttestationIdModel(v)
            | KeyParam::AssociatedData(v)
            | KeyParam::ConfirmationToken(v) => v.to_cbor_value()?,
        };
        Ok(cbor::value::Value::Array(crate::vec_try![tag, val]?))
    }
}

/// The two-partition key characteristics model: parameters the module itself
/// enforces, and advisory parameters bound into the blob but enforced (if at
/// all) by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, AsCborValue)]
pub struct KeyCharacteristics {
    pub hw_enforced: Vec<KeyParam>,
    pub sw_enforced: Vec<KeyParam>,
}

/// A timestamp in milliseconds since an authenticator-chosen epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, AsCborValue)]
pub struct Timestamp {
    pub milliseconds: i64,
}

/// Proof of user authentication, MACed by an authenticator sharing the
/// negotiated HMAC key.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct HardwareAuthToken {
    pub challenge: i64,
    pub user_id: i64,
    pub authenticator_id: i64,
    pub authenticator_type: HardwareAuthenticatorType,
    pub timestamp: Timestamp,
    pub mac: Vec<u8>,
}

/// Proof of a time/parameter verification event, MACed under the negotiated
/// HMAC key.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct VerificationToken {
    pub challenge: i64,
    pub timestamp: Timestamp,
    pub parameters_verified: Vec<KeyParam>,
    pub security_level: SecurityLevel,
    pub mac: Vec<u8>,
}

/// Module identity reported by the get-HW-info command.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct HardwareInfo {
    pub security_level: SecurityLevel,
    pub keymaster_name: alloc::string::String,
    pub author_name: alloc::string::String,
}
