//! Functionality shared across the Keymaster secure applet implementation.

#![no_std]
extern crate alloc;

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use kma_wire::keymaster::ErrorCode;
use kma_wire::CborError;

pub use kma_wire as wire;

pub mod crypto;
pub mod keyblob;
pub mod tag;

/// General error type.
#[derive(Debug)]
pub enum Error {
    /// CBOR conversion error.
    Cbor(CborError),
    /// Keymaster error, with extra debug information.
    Hal(ErrorCode, String),
    /// Memory allocation error.
    Alloc(&'static str),
}

impl Error {
    /// The numeric error code that travels on the wire for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Cbor(_) => ErrorCode::UnknownError,
            Error::Hal(code, _) => *code,
            Error::Alloc(_) => ErrorCode::MemoryAllocationFailed,
        }
    }
}

impl From<CborError> for Error {
    fn from(e: CborError) -> Self {
        Error::Cbor(e)
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_e: alloc::collections::TryReserveError) -> Self {
        Error::Alloc("allocation of Error failed")
    }
}

/// Macro to build an [`Error::Hal`] instance for a specific [`ErrorCode`] value known at compile
/// time: `km_err!(InvalidTag, "some {} format", arg)`.
#[macro_export]
macro_rules! km_err {
    { $error:ident, $fmt:expr $(, $arg:expr)* $(,)? } => {
        $crate::Error::Hal(
            $crate::wire::keymaster::ErrorCode::$error,
            alloc::format!(concat!("{}:{}: ", $fmt), file!(), line!() $(, $arg)*),
        )
    };
}

/// Macro to build an [`Error::Hal`] instance from a variable [`ErrorCode`] value:
/// `km_verr!(rc, "some {} format", arg)`.
#[macro_export]
macro_rules! km_verr {
    { $error:expr, $fmt:expr $(, $arg:expr)* $(,)? } => {
        $crate::Error::Hal(
            $error,
            alloc::format!(concat!("{}:{}: ", $fmt), file!(), line!() $(, $arg)*),
        )
    };
}

/// Macro to allocate a `Vec<T>` with the given capacity, detecting allocation failure.
#[macro_export]
macro_rules! vec_try_with_capacity {
    { $len:expr } => {{
        let mut v = alloc::vec::Vec::new();
        match v.try_reserve($len) {
            Err(_e) => Err($crate::Error::Alloc("allocation of Vec failed")),
            Ok(_) => Ok(v),
        }
    }};
}

/// Function that mimics `slice.to_vec()` but which detects allocation failures.
pub fn try_to_vec<T: Clone>(s: &[T]) -> Result<Vec<T>, Error> {
    let mut v = vec_try_with_capacity!(s.len())?;
    v.extend_from_slice(s);
    Ok(v)
}

/// Extension trait to provide fallible-allocation variants of `Vec` methods.
pub trait FallibleAllocExt<T> {
    fn try_push(&mut self, value: T) -> Result<(), alloc::collections::TryReserveError>;
    fn try_extend_from_slice(
        &mut self,
        other: &[T],
    ) -> Result<(), alloc::collections::TryReserveError>
    where
        T: Clone;
}

impl<T> FallibleAllocExt<T> for Vec<T> {
    fn try_push(&mut self, value: T) -> Result<(), alloc::collections::TryReserveError> {
        self.try_reserve(1)?;
        self.push(value);
        Ok(())
    }
    fn try_extend_from_slice(
        &mut self,
        other: &[T],
    ) -> Result<(), alloc::collections::TryReserveError>
    where
        T: Clone,
    {
        self.try_reserve(other.len())?;
        self.extend_from_slice(other);
        Ok(())
    }
}

/// Check for an expected error.
#[macro_export]
macro_rules! expect_err {
    ($result:expr, $err_msg:expr) => {
        assert!(
            $result.is_err(),
            "Expected error containing '{}', got success {:?}",
            $err_msg,
            $result
        );
        let err = $result.map(|_| ()).unwrap_err();
        let err_str = alloc::format!("{:?}", err);
        assert!(
            err_str.contains($err_msg),
            "Unexpected error {}, doesn't contain '{}'",
            err_str,
            $err_msg
        );
    };
}

/// Convert data to a hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut result = String::new();
    for byte in data {
        let hi = HEX_CHARS[((byte >> 4) & 0x0f) as usize];
        let lo = HEX_CHARS[(byte & 0x0f) as usize];
        result.push(hi);
        result.push(lo);
    }
    result
}

const HEX_CHARS: [char; 16] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f'];

/// Convert a hex string to data.
pub fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    let mut result = Vec::new();
    let mut pending = 0u8;
    for (idx, c) in s.chars().enumerate() {
        let nibble: u8 = match c {
            '0'..='9' => c as u8 - b'0',
            'a'..='f' => c as u8 - b'a' + 10,
            'A'..='F' => c as u8 - b'A' + 10,
            _ => return Err("char {c} not a hex digit".to_string()),
        };
        if idx % 2 == 0 {
            pending = nibble << 4;
        } else {
            result.push(pending | nibble);
        }
    }
    if s.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    Ok(result)
}
