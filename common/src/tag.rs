//! Helpers for handling sets of key parameters: retrieval macros, the
//! hardware/software enforcement split, and the per-algorithm checks applied
//! when keys are created and when operations begin.

use crate::crypto::{aes, hmac, rsa};
use crate::{km_err, try_to_vec, vec_try_with_capacity, Error, FallibleAllocExt};
use alloc::vec::Vec;
use kma_wire::keymaster::{
    Algorithm, BlockMode, Digest, EcCurve, KeyCharacteristics, KeyOrigin, KeyParam, KeyPurpose,
    PaddingMode, Tag,
};
use kma_wire::{KeySizeInBits, RsaExponent};

/// Retrieve the value of the (single) tag of interest from a collection of
/// [`KeyParam`]s, failing with `InvalidTag` if the tag appears more than once.
#[macro_export]
macro_rules! get_opt_tag_value {
    { $params:expr, $variant:ident } => {
        {
            let mut result = Ok(None);
            let mut found = false;
            for param in $params.iter() {
                if let $crate::wire::keymaster::KeyParam::$variant(v) = param {
                    if found {
                        result = Err($crate::km_err!(
                            InvalidTag,
                            "duplicate tag {} found",
                            stringify!($variant)
                        ));
                    } else {
                        found = true;
                        result = Ok(Some(v));
                    }
                }
            }
            result
        }
    };
}

/// Retrieve the value of the (single) tag of interest, failing with the given
/// error code if absent.
#[macro_export]
macro_rules! get_tag_value {
    { $params:expr, $variant:ident, $missing_err:ident } => {
        match $crate::get_opt_tag_value!($params, $variant) {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err($crate::km_err!(
                $missing_err,
                "missing tag {}",
                stringify!($variant)
            )),
            Err(e) => Err(e),
        }
    };
}

/// Check for the presence of a boolean tag.
#[macro_export]
macro_rules! get_bool_tag_value {
    { $params:expr, $variant:ident } => {
        {
            let mut found = false;
            for param in $params.iter() {
                if let $crate::wire::keymaster::KeyParam::$variant = param {
                    found = true;
                }
            }
            found
        }
    };
}

/// Check whether a tag with a specific value is present.
#[macro_export]
macro_rules! contains_tag_value {
    { $params:expr, $variant:ident, $value:expr } => {
        {
            let mut found = false;
            for param in $params.iter() {
                if let $crate::wire::keymaster::KeyParam::$variant(v) = param {
                    if *v == $value {
                        found = true;
                    }
                }
            }
            found
        }
    };
}

/// Get the [`Algorithm`] from a set of parameters.
pub fn get_algorithm(params: &[KeyParam]) -> Result<Algorithm, Error> {
    Ok(*get_tag_value!(params, Algorithm, UnsupportedAlgorithm)?)
}

/// Get the [`BlockMode`] from a set of parameters. Exactly one must be
/// present for an operation to begin.
pub fn get_block_mode(params: &[KeyParam]) -> Result<BlockMode, Error> {
    Ok(*get_tag_value!(params, BlockMode, UnsupportedBlockMode)?)
}

/// Get the [`PaddingMode`] from a set of parameters.
pub fn get_padding_mode(params: &[KeyParam]) -> Result<PaddingMode, Error> {
    Ok(*get_tag_value!(params, Padding, UnsupportedPaddingMode)?)
}

/// Get the [`Digest`] from a set of parameters.
pub fn get_digest(params: &[KeyParam]) -> Result<Digest, Error> {
    Ok(*get_tag_value!(params, Digest, UnsupportedDigest)?)
}

/// Get the MAC length (in bits) from a set of parameters.
pub fn get_mac_length(params: &[KeyParam]) -> Result<u32, Error> {
    Ok(*get_tag_value!(params, MacLength, MissingMacLength)?)
}

/// Get the key size from a set of parameters.
pub fn get_key_size(params: &[KeyParam]) -> Result<KeySizeInBits, Error> {
    Ok(*get_tag_value!(params, KeySize, UnsupportedKeySize)?)
}

/// Get the EC curve from a set of parameters, if present.
pub fn get_ec_curve(params: &[KeyParam]) -> Result<Option<EcCurve>, Error> {
    Ok(get_opt_tag_value!(params, EcCurve)?.copied())
}

/// Build the hidden parameter set that key blobs are bound to: the caller's
/// application id and data, plus the current root of trust.
pub fn hidden(params: &[KeyParam], rot: &[u8]) -> Result<Vec<KeyParam>, Error> {
    let mut results = Vec::new();
    if let Ok(Some(app_id)) = get_opt_tag_value!(params, ApplicationId) {
        results.try_push(KeyParam::ApplicationId(try_to_vec(app_id)?))?;
    }
    if let Ok(Some(app_data)) = get_opt_tag_value!(params, ApplicationData) {
        results.try_push(KeyParam::ApplicationData(try_to_vec(app_data)?))?;
    }
    results.try_push(KeyParam::RootOfTrust(try_to_vec(rot)?))?;
    Ok(results)
}

/// Indicate whether the enforcement of a parameter happens in the secure
/// environment, placing it in the hardware-enforced list of the key's
/// characteristics.
fn is_hw_enforced(param: &KeyParam) -> bool {
    matches!(
        param.tag(),
        Tag::Purpose
            | Tag::Algorithm
            | Tag::KeySize
            | Tag::BlockMode
            | Tag::Digest
            | Tag::Padding
            | Tag::CallerNonce
            | Tag::MinMacLength
            | Tag::EcCurve
            | Tag::RsaPublicExponent
            | Tag::IncludeUniqueId
            | Tag::UserSecureId
            | Tag::NoAuthRequired
            | Tag::UserAuthType
            | Tag::AuthTimeout
            | Tag::TrustedUserPresenceRequired
            | Tag::TrustedConfirmationRequired
            | Tag::UnlockedDeviceRequired
            | Tag::Origin
            | Tag::OsVersion
            | Tag::OsPatchlevel
            | Tag::MinSecondsBetweenOps
            | Tag::MaxUsesPerBoot
    )
}

/// Tags that are accepted in key-creation requests but never stored in the
/// key's characteristics.
fn is_ephemeral(param: &KeyParam) -> bool {
    matches!(
        param.tag(),
        Tag::ApplicationId
            | Tag::ApplicationData
            | Tag::AttestationChallenge
            | Tag::AttestationApplicationId
            | Tag::ResetSinceIdRotation
            | Tag::RootOfTrust
            | Tag::UniqueId
            | Tag::MacLength
            | Tag::Nonce
            | Tag::AssociatedData
            | Tag::ConfirmationToken
    )
}

/// Build the characteristics for a newly-created key: the caller's parameters
/// split by enforcement level, with the key's origin and the current system
/// version information added to the hardware-enforced set, plus any extra
/// parameters that key generation or import deduced along the way.
pub fn extract_key_characteristics(
    origin: KeyOrigin,
    params: &[KeyParam],
    deduced: &[KeyParam],
    os_version: u32,
    os_patchlevel: u32,
) -> Result<KeyCharacteristics, Error> {
    if get_opt_tag_value!(params, Origin)?.is_some() {
        return Err(km_err!(InvalidTag, "caller cannot specify key origin"));
    }
    let mut hw_enforced = Vec::new();
    let mut sw_enforced = Vec::new();
    for param in params.iter().chain(deduced.iter()) {
        if is_ephemeral(param) {
            continue;
        }
        if is_hw_enforced(param) {
            hw_enforced.try_push(param.clone())?;
        } else {
            sw_enforced.try_push(param.clone())?;
        }
    }
    hw_enforced.try_push(KeyParam::Origin(origin))?;
    hw_enforced.try_push(KeyParam::OsVersion(os_version))?;
    hw_enforced.try_push(KeyParam::OsPatchlevel(os_patchlevel))?;
    Ok(KeyCharacteristics { hw_enforced, sw_enforced })
}

/// Check the parameters for RSA key creation, returning the key size and
/// public exponent. Only 2048-bit keys with exponent 65537 are accepted.
pub fn check_rsa_params(params: &[KeyParam]) -> Result<(KeySizeInBits, RsaExponent), Error> {
    let key_size = get_key_size(params)?;
    if key_size.0 != rsa::REQUIRED_KEY_SIZE_BITS {
        return Err(km_err!(UnsupportedKeySize, "RSA key size {} not supported", key_size.0));
    }
    let pub_exponent = *get_tag_value!(params, RsaPublicExponent, InvalidArgument)?;
    if pub_exponent.0 != rsa::REQUIRED_EXPONENT {
        return Err(km_err!(
            InvalidArgument,
            "RSA public exponent {} not supported",
            pub_exponent.0
        ));
    }
    Ok((key_size, pub_exponent))
}

/// Check the parameters for EC key creation, returning the curve. The curve
/// may be specified directly or implied by a key size; only P-256 is
/// supported.
pub fn check_ec_params(params: &[KeyParam]) -> Result<EcCurve, Error> {
    let curve = match get_ec_curve(params)? {
        Some(curve) => curve,
        None => {
            let key_size = get_key_size(params)?;
            crate::crypto::ec::key_size_to_curve(key_size)?
        }
    };
    if curve != EcCurve::P256 {
        return Err(km_err!(UnsupportedEcCurve, "EC curve {:?} not supported", curve));
    }
    Ok(curve)
}

/// Check the parameters for AES key creation, returning the variant.
pub fn check_aes_params(params: &[KeyParam]) -> Result<aes::Variant, Error> {
    let key_size = get_key_size(params)?;
    let variant = match key_size.0 {
        128 => aes::Variant::Aes128,
        256 => aes::Variant::Aes256,
        s => return Err(km_err!(UnsupportedKeySize, "AES key size {} not supported", s)),
    };
    if contains_tag_value!(params, BlockMode, BlockMode::Gcm) {
        let min_mac_len = *get_tag_value!(params, MinMacLength, MissingMinMacLength)?;
        if min_mac_len % 8 != 0 || !(96..=128).contains(&min_mac_len) {
            return Err(km_err!(
                UnsupportedMinMacLength,
                "min MAC length {} invalid for AES-GCM",
                min_mac_len
            ));
        }
    }
    Ok(variant)
}

/// Check the parameters for 3-DES key creation.
pub fn check_3des_params(params: &[KeyParam]) -> Result<(), Error> {
    let key_size = get_key_size(params)?;
    if key_size != crate::crypto::des::KEY_SIZE_BITS {
        return Err(km_err!(UnsupportedKeySize, "3-DES key size {} not supported", key_size.0));
    }
    Ok(())
}

/// Check the parameters for HMAC key creation, returning the key size. A
/// single digest other than `None` must be specified, along with a minimum
/// MAC length that fits the digest.
pub fn check_hmac_params(params: &[KeyParam]) -> Result<KeySizeInBits, Error> {
    let key_size = get_key_size(params)?;
    hmac::valid_hal_size(key_size)?;
    let digest = get_digest(params)?;
    let digest_bits = digest_len_bits(digest)?;
    let min_mac_len = *get_tag_value!(params, MinMacLength, MissingMinMacLength)?;
    if min_mac_len % 8 != 0 || min_mac_len < 64 || min_mac_len > digest_bits {
        return Err(km_err!(
            UnsupportedMinMacLength,
            "min MAC length {} invalid for HMAC-{:?}",
            min_mac_len,
            digest
        ));
    }
    Ok(key_size)
}

/// Return the output size of a digest in bits.
pub fn digest_len_bits(digest: Digest) -> Result<u32, Error> {
    match digest {
        Digest::Md5 => Ok(128),
        Digest::Sha1 => Ok(160),
        Digest::Sha224 => Ok(224),
        Digest::Sha256 => Ok(256),
        Digest::Sha384 => Ok(384),
        Digest::Sha512 => Ok(512),
        Digest::None => Err(km_err!(UnsupportedDigest, "no digest specified")),
    }
}

/// Check that an operation's purpose is allowed by the key.
pub fn check_purpose(chars: &KeyCharacteristics, purpose: KeyPurpose) -> Result<(), Error> {
    if !contains_tag_value!(chars.hw_enforced, Purpose, purpose)
        && !contains_tag_value!(chars.sw_enforced, Purpose, purpose)
    {
        return Err(km_err!(IncompatiblePurpose, "purpose {:?} not allowed by key", purpose));
    }
    Ok(())
}

/// Check that the operation parameters at `begin()` are consistent with the
/// key's characteristics.
pub fn check_begin_params(
    chars: &KeyCharacteristics,
    purpose: KeyPurpose,
    params: &[KeyParam],
) -> Result<(), Error> {
    check_purpose(chars, purpose)?;
    let algorithm = get_algorithm(&chars.hw_enforced)?;

    if let Some(mode) = get_opt_tag_value!(params, BlockMode)? {
        if !contains_tag_value!(chars.hw_enforced, BlockMode, *mode) {
            return Err(km_err!(
                IncompatibleBlockMode,
                "block mode {:?} not allowed by key",
                mode
            ));
        }
    }
    if let Some(padding) = get_opt_tag_value!(params, Padding)? {
        if !contains_tag_value!(chars.hw_enforced, Padding, *padding) {
            return Err(km_err!(
                IncompatiblePaddingMode,
                "padding mode {:?} not allowed by key",
                padding
            ));
        }
    }
    if let Some(digest) = get_opt_tag_value!(params, Digest)? {
        // RSA signing with no padding carries no digest requirement.
        if *digest != Digest::None
            && !contains_tag_value!(chars.hw_enforced, Digest, *digest)
        {
            return Err(km_err!(IncompatibleDigest, "digest {:?} not allowed by key", digest));
        }
    }
    if get_opt_tag_value!(params, Nonce)?.is_some()
        && !get_bool_tag_value!(chars.hw_enforced, CallerNonce)
        && purpose == KeyPurpose::Encrypt
    {
        return Err(km_err!(CallerNonceProhibited, "caller nonce not allowed by key"));
    }
    if let Some(mac_len) = get_opt_tag_value!(params, MacLength)? {
        let min_mac_len = get_opt_tag_value!(chars.hw_enforced, MinMacLength)?;
        if let Some(min_mac_len) = min_mac_len {
            if mac_len < min_mac_len {
                return Err(km_err!(
                    InvalidMacLength,
                    "MAC length {} below key minimum {}",
                    mac_len,
                    min_mac_len
                ));
            }
        }
        match algorithm {
            Algorithm::Aes => {
                if mac_len % 8 != 0 || !(96..=128).contains(mac_len) {
                    return Err(km_err!(
                        UnsupportedMacLength,
                        "MAC length {} invalid for AES-GCM",
                        mac_len
                    ));
                }
            }
            Algorithm::Hmac => {
                let digest = get_digest(params)
                    .or_else(|_e| get_digest(&chars.hw_enforced))?;
                if mac_len % 8 != 0 || *mac_len > digest_len_bits(digest)? {
                    return Err(km_err!(
                        UnsupportedMacLength,
                        "MAC length {} too large for HMAC-{:?}",
                        mac_len,
                        digest
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Merge the hardware- and software-enforced parameter lists of a key's
/// characteristics into one list.
pub fn merged_chars(chars: &KeyCharacteristics) -> Result<Vec<KeyParam>, Error> {
    let mut merged =
        vec_try_with_capacity!(chars.hw_enforced.len() + chars.sw_enforced.len())?;
    for param in chars.hw_enforced.iter().chain(chars.sw_enforced.iter()) {
        merged.push(param.clone());
    }
    Ok(merged)
}
