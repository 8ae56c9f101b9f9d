//! Tests for parameter access, characteristics extraction and the
//! create/begin checks.

extern crate alloc;

use kma_common::crypto::aes;
use kma_common::expect_err;
use kma_common::tag::{
    check_aes_params, check_begin_params, check_ec_params, check_hmac_params, check_rsa_params,
    extract_key_characteristics, get_algorithm, hidden,
};
use kma_wire::keymaster::{
    Algorithm, BlockMode, DateTime, Digest, EcCurve, KeyCharacteristics, KeyOrigin, KeyParam,
    KeyPurpose, PaddingMode, Tag,
};
use kma_wire::{KeySizeInBits, RsaExponent};

#[test]
fn test_get_algorithm() {
    let params = vec![
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::Algorithm(Algorithm::Aes),
    ];
    assert_eq!(get_algorithm(&params).unwrap(), Algorithm::Aes);

    let missing = vec![KeyParam::KeySize(KeySizeInBits(256))];
    expect_err!(get_algorithm(&missing), "missing tag Algorithm");

    let dup = vec![
        KeyParam::Algorithm(Algorithm::Aes),
        KeyParam::Algorithm(Algorithm::Hmac),
    ];
    expect_err!(get_algorithm(&dup), "duplicate tag");
}

#[test]
fn test_hidden_params() {
    let params = vec![
        KeyParam::ApplicationId(b"appid".to_vec()),
        KeyParam::ApplicationData(b"appdata".to_vec()),
        KeyParam::KeySize(KeySizeInBits(128)),
    ];
    let rot = [0xaau8; 32];
    let hidden = hidden(&params, &rot).unwrap();
    assert_eq!(
        hidden,
        vec![
            KeyParam::ApplicationId(b"appid".to_vec()),
            KeyParam::ApplicationData(b"appdata".to_vec()),
            KeyParam::RootOfTrust(rot.to_vec()),
        ]
    );
}

#[test]
fn test_extract_key_characteristics() {
    let params = vec![
        KeyParam::Algorithm(Algorithm::Aes),
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::Purpose(KeyPurpose::Encrypt),
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::MinMacLength(96),
        KeyParam::ApplicationId(b"appid".to_vec()),
        KeyParam::CreationDatetime(DateTime { ms_since_epoch: 22 }),
    ];
    let chars =
        extract_key_characteristics(KeyOrigin::Generated, &params, &[], 11, 202203).unwrap();

    // Hidden parameters never appear in the characteristics.
    assert!(!chars
        .hw_enforced
        .iter()
        .chain(chars.sw_enforced.iter())
        .any(|p| p.tag() == Tag::ApplicationId));
    // Origin and system version information land in the hardware list.
    assert!(chars.hw_enforced.contains(&KeyParam::Origin(KeyOrigin::Generated)));
    assert!(chars.hw_enforced.contains(&KeyParam::OsVersion(11)));
    assert!(chars.hw_enforced.contains(&KeyParam::OsPatchlevel(202203)));
    // Creation time is enforced by the host.
    assert!(chars
        .sw_enforced
        .contains(&KeyParam::CreationDatetime(DateTime { ms_since_epoch: 22 })));
}

#[test]
fn test_extract_key_characteristics_rejects_origin() {
    let params = vec![
        KeyParam::Algorithm(Algorithm::Aes),
        KeyParam::Origin(KeyOrigin::Imported),
    ];
    expect_err!(
        extract_key_characteristics(KeyOrigin::Generated, &params, &[], 0, 0),
        "cannot specify key origin"
    );
}

#[test]
fn test_extract_key_characteristics_keeps_verify() {
    // Sign/verify purpose pairs are stored as-is; only the usable subset is
    // enforced at begin() time.
    let params = vec![
        KeyParam::Algorithm(Algorithm::Rsa),
        KeyParam::Purpose(KeyPurpose::Sign),
        KeyParam::Purpose(KeyPurpose::Verify),
    ];
    let chars = extract_key_characteristics(KeyOrigin::Generated, &params, &[], 0, 0).unwrap();
    assert!(chars.hw_enforced.contains(&KeyParam::Purpose(KeyPurpose::Verify)));
}

#[test]
fn test_check_rsa_params() {
    let ok = vec![
        KeyParam::KeySize(KeySizeInBits(2048)),
        KeyParam::RsaPublicExponent(RsaExponent(65537)),
    ];
    assert_eq!(
        check_rsa_params(&ok).unwrap(),
        (KeySizeInBits(2048), RsaExponent(65537))
    );

    let bad_size = vec![
        KeyParam::KeySize(KeySizeInBits(1024)),
        KeyParam::RsaPublicExponent(RsaExponent(65537)),
    ];
    expect_err!(check_rsa_params(&bad_size), "RSA key size");

    let bad_exponent = vec![
        KeyParam::KeySize(KeySizeInBits(2048)),
        KeyParam::RsaPublicExponent(RsaExponent(3)),
    ];
    expect_err!(check_rsa_params(&bad_exponent), "RSA public exponent");
}

#[test]
fn test_check_ec_params() {
    let by_curve = vec![KeyParam::EcCurve(EcCurve::P256)];
    assert_eq!(check_ec_params(&by_curve).unwrap(), EcCurve::P256);

    let by_size = vec![KeyParam::KeySize(KeySizeInBits(256))];
    assert_eq!(check_ec_params(&by_size).unwrap(), EcCurve::P256);

    let bad_curve = vec![KeyParam::EcCurve(EcCurve::P384)];
    expect_err!(check_ec_params(&bad_curve), "not supported");
}

#[test]
fn test_check_aes_params() {
    let ok = vec![
        KeyParam::KeySize(KeySizeInBits(128)),
        KeyParam::BlockMode(BlockMode::Cbc),
    ];
    assert_eq!(check_aes_params(&ok).unwrap(), aes::Variant::Aes128);

    // 192-bit keys are not accepted for key creation.
    let aes192 = vec![KeyParam::KeySize(KeySizeInBits(192))];
    expect_err!(check_aes_params(&aes192), "not supported");

    let gcm_no_mac = vec![
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::BlockMode(BlockMode::Gcm),
    ];
    expect_err!(check_aes_params(&gcm_no_mac), "missing tag MinMacLength");

    let gcm_short_mac = vec![
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::MinMacLength(64),
    ];
    expect_err!(check_aes_params(&gcm_short_mac), "min MAC length");
}

#[test]
fn test_check_hmac_params() {
    let ok = vec![
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::Digest(Digest::Sha256),
        KeyParam::MinMacLength(128),
    ];
    assert_eq!(check_hmac_params(&ok).unwrap(), KeySizeInBits(256));

    let too_small = vec![
        KeyParam::KeySize(KeySizeInBits(32)),
        KeyParam::Digest(Digest::Sha256),
        KeyParam::MinMacLength(128),
    ];
    expect_err!(check_hmac_params(&too_small), "out of range");

    let mac_too_long = vec![
        KeyParam::KeySize(KeySizeInBits(256)),
        KeyParam::Digest(Digest::Sha256),
        KeyParam::MinMacLength(512),
    ];
    expect_err!(check_hmac_params(&mac_too_long), "min MAC length");
}

#[test]
fn test_check_begin_params() {
    let chars = KeyCharacteristics {
        hw_enforced: vec![
            KeyParam::Algorithm(Algorithm::Aes),
            KeyParam::KeySize(KeySizeInBits(256)),
            KeyParam::Purpose(KeyPurpose::Encrypt),
            KeyParam::Purpose(KeyPurpose::Decrypt),
            KeyParam::BlockMode(BlockMode::Gcm),
            KeyParam::Padding(PaddingMode::None),
            KeyParam::MinMacLength(104),
        ],
        sw_enforced: vec![],
    };
    let params = vec![
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::Padding(PaddingMode::None),
        KeyParam::MacLength(128),
    ];
    check_begin_params(&chars, KeyPurpose::Encrypt, &params).unwrap();

    expect_err!(
        check_begin_params(&chars, KeyPurpose::Sign, &params),
        "purpose Sign not allowed"
    );

    let wrong_mode = vec![
        KeyParam::BlockMode(BlockMode::Ecb),
        KeyParam::Padding(PaddingMode::None),
    ];
    expect_err!(
        check_begin_params(&chars, KeyPurpose::Encrypt, &wrong_mode),
        "block mode Ecb not allowed"
    );

    let short_mac = vec![
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::Padding(PaddingMode::None),
        KeyParam::MacLength(96),
    ];
    expect_err!(
        check_begin_params(&chars, KeyPurpose::Encrypt, &short_mac),
        "below key minimum"
    );

    let caller_nonce = vec![
        KeyParam::BlockMode(BlockMode::Gcm),
        KeyParam::Padding(PaddingMode::None),
        KeyParam::MacLength(128),
        KeyParam::Nonce(vec![0; 12]),
    ];
    expect_err!(
        check_begin_params(&chars, KeyPurpose::Encrypt, &caller_nonce),
        "caller nonce not allowed"
    );
}
