//! Crash recovery tests for `RedbNonceStore`.
//!
//! Nonce records must persist across database close/reopen cycles: a nonce
//! accepted before a restart is still a replay after it.

use signalgate_server::storage::{NonceClaim, NonceRecord, NonceStore, RedbNonceStore};
use tempfile::tempdir;

fn record(device_id: &str, nonce: &str, now: u64) -> NonceRecord {
    NonceRecord {
        device_id: device_id.to_string(),
        nonce: nonce.to_string(),
        first_seen_at: now,
        expires_at: now + 600,
    }
}

#[tokio::test]
async fn accepted_nonces_survive_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nonces.redb");

    {
        let store = RedbNonceStore::open(&db_path).unwrap();
        for i in 0..10 {
            let claim = store.check_and_set(record("dev-1", &format!("nonce-{i}"), 1000)).await;
            assert_eq!(claim, Ok(NonceClaim::Accepted));
        }

        // Database dropped
    }

    {
        let store = RedbNonceStore::open(&db_path).unwrap();
        assert_eq!(store.len().unwrap(), 10);

        for i in 0..10 {
            let claim = store.check_and_set(record("dev-1", &format!("nonce-{i}"), 1010)).await;
            assert_eq!(claim, Ok(NonceClaim::Replayed { first_seen_at: 1000 }));
        }
    }
}

#[tokio::test]
async fn rejected_claim_does_not_overwrite() {
    let dir = tempdir().unwrap();
    let store = RedbNonceStore::open(dir.path().join("nonces.redb")).unwrap();

    store.check_and_set(record("dev-1", "abc123", 1000)).await.unwrap();
    store.check_and_set(record("dev-1", "abc123", 1300)).await.unwrap();

    let stored = store.get("dev-1", "abc123").unwrap().unwrap();
    assert_eq!(stored.first_seen_at, 1000);
    assert_eq!(stored.expires_at, 1600);
}

#[tokio::test]
async fn ttl_boundary() {
    let dir = tempdir().unwrap();
    let store = RedbNonceStore::open(dir.path().join("nonces.redb")).unwrap();

    store.check_and_set(record("dev-1", "n", 1000)).await.unwrap();

    // TTL - 1: still a replay.
    assert!(matches!(
        store.check_and_set(record("dev-1", "n", 1599)).await,
        Ok(NonceClaim::Replayed { first_seen_at: 1000 })
    ));
    // TTL + 1: the pair may be used again.
    assert_eq!(store.check_and_set(record("dev-1", "n", 1601)).await, Ok(NonceClaim::Accepted));
}

#[tokio::test]
async fn purge_survives_restart_and_spares_live_records() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nonces.redb");

    {
        let store = RedbNonceStore::open(&db_path).unwrap();
        store.check_and_set(record("dev-1", "old", 1000)).await.unwrap();
        store.check_and_set(record("dev-1", "new", 1500)).await.unwrap();

        assert_eq!(store.purge_expired(1599).unwrap(), 0);
        assert_eq!(store.purge_expired(1600).unwrap(), 1);
    }

    {
        let store = RedbNonceStore::open(&db_path).unwrap();
        assert!(store.get("dev-1", "old").unwrap().is_none());
        assert!(store.get("dev-1", "new").unwrap().is_some());
    }
}

#[tokio::test]
async fn later_claims_sweep_expired_records() {
    let dir = tempdir().unwrap();
    let store = RedbNonceStore::open(dir.path().join("nonces.redb")).unwrap();

    for day in 0..6u64 {
        let now = 1000 + day * 86_400;
        store.check_and_set(record("dev-1", &format!("n{day}"), now)).await.unwrap();
    }

    assert_eq!(store.len().unwrap(), 1);
    assert!(store.get("dev-1", "n5").unwrap().is_some());
    assert!(store.get("dev-1", "n0").unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_claims_accept_once() {
    let dir = tempdir().unwrap();
    let store = RedbNonceStore::open(dir.path().join("nonces.redb")).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.check_and_set(record("dev-1", "race", 1000)).await }));
    }

    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() == Ok(NonceClaim::Accepted) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}
