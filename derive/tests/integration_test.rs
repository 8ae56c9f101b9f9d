//! Tests exercising the derive against standalone struct and enum types.

extern crate alloc;

use kma_derive::AsCborValue;
use kma_wire::{cbor_type_error, AsCborValue, CborError};

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
struct NamedFields {
    i: i32,
    s: String,
}

#[test]
fn test_derive_named_struct_roundtrip() {
    let want = NamedFields { i: 42, s: "a string".to_string() };
    let want_value = want.clone().to_cbor_value().unwrap();
    let got = NamedFields::from_cbor_value(want_value).unwrap();
    assert_eq!(want, got);
}

#[test]
fn test_derive_named_struct_bad_input() {
    // Not an array at all.
    let result = NamedFields::from_cbor_value(ciborium::value::Value::Integer(1.into()));
    assert!(matches!(result, Err(CborError::UnexpectedItem(_, _))));

    // An array of the wrong length.
    let short = ciborium::value::Value::Array(vec![ciborium::value::Value::Integer(1.into())]);
    let result = NamedFields::from_cbor_value(short);
    assert!(matches!(result, Err(CborError::UnexpectedItem(_, _))));
}

#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
struct UnnamedFields(i32, String);

#[test]
fn test_derive_unnamed_struct_roundtrip() {
    let want = UnnamedFields(42, "a string".to_string());
    let want_value = want.clone().to_cbor_value().unwrap();
    let got = UnnamedFields::from_cbor_value(want_value).unwrap();
    assert_eq!(want, got);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsCborValue)]
#[repr(i32)]
enum NumericEnum {
    One = 1,
    Two = 2,
    Three = 3,
}

#[test]
fn test_derive_numeric_enum_roundtrip() {
    let want = NumericEnum::Two;
    let want_value = want.to_cbor_value().unwrap();
    assert_eq!(want_value, ciborium::value::Value::Integer(2.into()));
    let got = NumericEnum::from_cbor_value(want_value).unwrap();
    assert_eq!(want, got);
}

#[test]
fn test_derive_numeric_enum_bad_discriminant() {
    let result = NumericEnum::from_cbor_value(ciborium::value::Value::Integer(4.into()));
    assert!(matches!(result, Err(CborError::NonEnumValue)));
    let result = NumericEnum::from_cbor_value(ciborium::value::Value::Text("Two".to_string()));
    assert!(matches!(result, Err(CborError::UnexpectedItem(_, _))));
}

#[test]
fn test_derive_slice_roundtrip() {
    let want = NamedFields { i: -7, s: String::new() };
    let data = want.clone().into_vec().unwrap();
    let got = NamedFields::from_slice(&data).unwrap();
    assert_eq!(want, got);
}
