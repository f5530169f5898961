//! Fuzz target for request signature verification
//!
//! # Invariants
//!
//! - A signature over the canonical request verifies
//! - Any change to a signed field, the body or the signature rejects
//! - Arbitrary signature strings never panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use signalgate_crypto::{CanonicalRequest, sign, verify};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    secret: Vec<u8>,
    method: String,
    path: String,
    device_id: String,
    timestamp: u64,
    nonce: String,
    body: Vec<u8>,
    attack: Attack,
}

#[derive(Debug, Arbitrary)]
enum Attack {
    FlipSignatureChar { index: usize },
    FlipBodyBit { index: usize, bit: u8 },
    ShiftTimestamp { delta: u64 },
    WrongSecret { extra: u8 },
    Garbage { signature: String },
}

fuzz_target!(|input: FuzzInput| {
    let canonical = CanonicalRequest::new(
        &input.method,
        &input.path,
        &input.device_id,
        input.timestamp,
        &input.nonce,
        &input.body,
    )
    .to_bytes();
    let signature = sign(&input.secret, &canonical);
    assert!(verify(&input.secret, &canonical, &signature));

    match input.attack {
        Attack::FlipSignatureChar { index } => {
            let mut forged = signature.into_bytes();
            let at = index % forged.len();
            forged[at] = if forged[at] == b'0' { b'1' } else { b'0' };
            let forged = String::from_utf8(forged).expect("hex stays ascii");
            assert!(!verify(&input.secret, &canonical, &forged));
        },
        Attack::FlipBodyBit { index, bit } => {
            if input.body.is_empty() {
                return;
            }
            let mut body = input.body.clone();
            let at = index % body.len();
            body[at] ^= 1 << (bit % 8);
            let tampered = CanonicalRequest::new(
                &input.method,
                &input.path,
                &input.device_id,
                input.timestamp,
                &input.nonce,
                &body,
            )
            .to_bytes();
            assert!(!verify(&input.secret, &tampered, &signature));
        },
        Attack::ShiftTimestamp { delta } => {
            if delta == 0 {
                return;
            }
            let shifted = CanonicalRequest::new(
                &input.method,
                &input.path,
                &input.device_id,
                input.timestamp.wrapping_add(delta),
                &input.nonce,
                &input.body,
            )
            .to_bytes();
            assert!(!verify(&input.secret, &shifted, &signature));
        },
        Attack::WrongSecret { extra } => {
            let mut other = input.secret.clone();
            other.push(extra | 1);
            assert!(!verify(&other, &canonical, &signature));
        },
        Attack::Garbage { signature: garbage } => {
            if garbage != signature {
                assert!(!verify(&input.secret, &canonical, &garbage));
            }
        },
    }
});
