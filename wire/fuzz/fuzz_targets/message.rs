//! Fuzzer for command frame parsing.

#![no_main]
use kma_wire::types::Command;
use kma_wire::AsCborValue;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // `data` allegedly holds a CBOR-framed command that has arrived from the
    // host driver.  Do we trust it? I don't think so...
    let _ = Command::from_slice(data);
});
