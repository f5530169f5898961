//! Property tests for the full gate.
//!
//! One fixture per property: key derivation is deliberately slow, and fresh
//! nonces from the seeded RNG keep cases independent.

use proptest::prelude::*;
use signalgate_core::{AuthOutcome, GateConfig, GateError};
use signalgate_harness::{GateFixture, SIM_EPOCH};

const PATH: &str = "/api/v1/signals";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

#[test]
fn prop_sealed_payload_roundtrips() {
    let runtime = runtime();
    let fixture = GateFixture::new(GateConfig::default()).unwrap();
    let device = fixture.register("dev-1").unwrap();

    proptest!(ProptestConfig::with_cases(64), |(payload in prop::collection::vec(any::<u8>(), 1..512))| {
        let request = device.sealed_request("POST", PATH, &payload).unwrap();
        let context = runtime.block_on(fixture.send(&request)).unwrap();

        prop_assert!(context.encrypted);
        prop_assert_eq!(context.payload, payload);
    });
}

#[test]
fn prop_any_body_tamper_is_bad_signature() {
    let runtime = runtime();
    let fixture = GateFixture::new(GateConfig { encryption_enabled: false, ..GateConfig::default() }).unwrap();
    let device = fixture.register("dev-1").unwrap();

    proptest!(ProptestConfig::with_cases(64), |(
        body in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    )| {
        let mut request = device.request("POST", PATH, &body).unwrap();
        let at = index.index(request.body.len());
        request.body[at] ^= flip;

        let err = runtime.block_on(fixture.send(&request)).unwrap_err();
        prop_assert_eq!(err.outcome(), Some(AuthOutcome::RejectedBadSignature));
        prop_assert!(fixture.store().get("dev-1", &request.headers.nonce).is_none());
    });
}

#[test]
fn prop_timestamp_accepted_iff_within_skew() {
    let runtime = runtime();
    let fixture = GateFixture::new(GateConfig { encryption_enabled: false, ..GateConfig::default() }).unwrap();
    let device = fixture.register("dev-1").unwrap();
    let skew = fixture.gate.config().timestamp_skew_secs;

    proptest!(ProptestConfig::with_cases(128), |(offset in -1000i64..=1000)| {
        let timestamp = SIM_EPOCH.checked_add_signed(offset).unwrap();
        let nonce = format!("n{timestamp}-{offset}");
        let request = device.request_with("GET", "/api/v1/poll", timestamp, &nonce, b"").unwrap();

        match runtime.block_on(fixture.send(&request)) {
            Ok(_) => prop_assert!(offset.unsigned_abs() <= skew, "accepted at offset {}", offset),
            Err(GateError::Unauthorized(failure)) => {
                prop_assert!(offset.unsigned_abs() > skew || failure.outcome() == AuthOutcome::RejectedReplay);
                if offset.unsigned_abs() > skew {
                    prop_assert_eq!(failure.outcome(), AuthOutcome::RejectedStaleTimestamp);
                }
            },
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    });
}
