//! Fuzz target for envelope bodies
//!
//! Request bodies are attacker-controlled JSON. Parsing and base64 decoding
//! must reject garbage without panicking, and a decoded envelope always has
//! a 12-byte nonce and at least a full tag of ciphertext.

#![no_main]

use libfuzzer_sys::fuzz_target;
use signalgate_proto::{ENVELOPE_NONCE_LEN, ENVELOPE_TAG_LEN, EnvelopeWire};

fuzz_target!(|data: &[u8]| {
    let Ok(wire) = EnvelopeWire::from_json(data) else {
        return;
    };
    let Ok(decoded) = wire.decode() else {
        return;
    };

    assert_eq!(decoded.nonce.len(), ENVELOPE_NONCE_LEN);
    assert!(decoded.ciphertext.len() >= ENVELOPE_TAG_LEN);
});
