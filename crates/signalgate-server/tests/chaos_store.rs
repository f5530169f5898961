//! Chaos property tests for the nonce path.
//!
//! With a store that fails at random, the gate must never authorize a
//! request whose nonce was not recorded, and a failed store call must
//! surface as `StoreUnavailable` rather than as an ordinary rejection.

use proptest::prelude::*;
use signalgate_core::{
    Device, Environment, GateError, GateSettings, RequestParts, RequestSigner, SigningSecret,
};
use signalgate_server::{
    ChaoticNonceStore, MemoryNonceStore, SystemEnv, build_gate,
    storage::{NonceClaim, NonceRecord, NonceStore},
};

const SECRET: &[u8] = b"chaos-device-secret";

fn settings() -> GateSettings {
    GateSettings::from_lookup(|name| match name {
        "DEVICE_KEY_KDF_SECRET" => Some("chaos-master-secret-0123456789abcdef".to_string()),
        "ENABLE_SIGNAL_ENCRYPTION" => Some("false".to_string()),
        _ => None,
    })
    .unwrap()
}

fn device() -> Device {
    Device::new("dev-1", SigningSecret::new(SECRET.to_vec()), 0)
}

#[test]
fn prop_gate_fails_closed_under_store_chaos() {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

    proptest!(ProptestConfig::with_cases(32), |(
        failure_rate in 0.0..1.0,
        seed in any::<u64>(),
        request_count in 1usize..40,
    )| {
        let store = ChaoticNonceStore::with_seed(MemoryNonceStore::new(), failure_rate, seed);
        let gate = build_gate(settings(), store);
        gate.registry().register(device()).unwrap();
        let signer = RequestSigner::new("dev-1", SigningSecret::new(SECRET.to_vec()));

        let mut authorized = 0usize;
        let mut unavailable = 0usize;

        for i in 0..request_count {
            let nonce = format!("chaos-{i}");
            let now = SystemEnv::new().wall_clock_secs();
            let headers = signer.sign("GET", "/api/v1/poll", now, &nonce, b"").unwrap();
            let pairs = headers.to_pairs();
            let request = RequestParts { method: "GET", path: "/api/v1/poll", headers: &pairs };

            match runtime.block_on(gate.authenticate(&request, b"")) {
                Ok(context) => {
                    authorized += 1;
                    // ORACLE: every authorized request left a nonce record
                    prop_assert!(gate.store().inner().get("dev-1", &context.nonce).is_some());
                }
                Err(GateError::StoreUnavailable(_)) => {
                    unavailable += 1;
                    // ORACLE: an injected failure never reached the store
                    prop_assert!(gate.store().inner().get("dev-1", &nonce).is_none());
                }
                Err(other) => prop_assert!(false, "unexpected rejection: {other:?}"),
            }
        }

        prop_assert_eq!(authorized + unavailable, request_count);
        prop_assert_eq!(unavailable, gate.store().failure_count());
        prop_assert_eq!(authorized, gate.store().inner().len());
    });
}

#[tokio::test]
async fn total_outage_rejects_everything() {
    let store = ChaoticNonceStore::new(MemoryNonceStore::new(), 1.0);

    for i in 0..20 {
        let record = NonceRecord {
            device_id: "dev-1".into(),
            nonce: format!("n{i}"),
            first_seen_at: 1000,
            expires_at: 1600,
        };
        assert!(store.check_and_set(record).await.is_err());
    }

    assert_eq!(store.operation_count(), 20);
    assert!(store.inner().is_empty());
}

#[tokio::test]
async fn no_chaos_is_transparent() {
    let store = ChaoticNonceStore::new(MemoryNonceStore::new(), 0.0);
    let record = NonceRecord {
        device_id: "dev-1".into(),
        nonce: "n".into(),
        first_seen_at: 1000,
        expires_at: 1600,
    };

    assert_eq!(store.check_and_set(record.clone()).await, Ok(NonceClaim::Accepted));
    assert_eq!(store.check_and_set(record).await, Ok(NonceClaim::Replayed { first_seen_at: 1000 }));
}
