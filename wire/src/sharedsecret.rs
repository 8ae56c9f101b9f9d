//! Types for shared secret negotiation.

use crate::{cbor_type_error, AsCborValue, CborError};
use alloc::vec::Vec;
use kma_derive::AsCborValue;

/// Label used when deriving the shared HMAC key.
pub const KEY_AGREEMENT_LABEL: &str = "KeymasterSharedMac";

/// Label MACed to prove possession of the freshly derived key.
pub const KEY_CHECK_LABEL: &str = "Keymaster HMAC Verification";

/// Per-party input to the HMAC key negotiation. The seed is empty for a fresh
/// negotiation; the nonce is this party's random contribution.
#[derive(Clone, Debug, PartialEq, Eq, AsCborValue)]
pub struct SharedSecretParameters {
    pub seed: Vec<u8>,
    pub nonce: Vec<u8>,
}
