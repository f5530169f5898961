//! Redb-backed durable nonce store.
//!
//! Uses Redb's ACID write transactions, so the lookup and the insert of a
//! check-and-set commit together or not at all. Records survive restarts:
//! a nonce accepted before a crash is still a replay after it.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};

use super::{NonceClaim, NonceRecord, NonceStore, NonceStoreError, SweepSchedule};

/// Table: nonces
/// Key: device_id length (u16 BE) + device_id bytes + nonce bytes
/// Value: first_seen_at (u64 BE) + expires_at (u64 BE) [16 bytes]
const NONCES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("nonces");

/// Durable nonce store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc). Each
/// check-and-set runs on Tokio's blocking pool so the calling task only
/// suspends while the transaction commits. Expired records are swept on
/// the same blocking task, ahead of the claim, once per sweep interval.
#[derive(Clone)]
pub struct RedbNonceStore {
    db: Arc<Database>,
    sweep: SweepSchedule,
}

impl RedbNonceStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `NonceStoreError::Backend` if the database cannot be opened or
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NonceStoreError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;

        let txn = db.begin_write().map_err(backend)?;
        {
            let _ = txn.open_table(NONCES).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;

        Ok(Self { db: Arc::new(db), sweep: SweepSchedule::default() })
    }

    /// Remove records with `expires_at <= now`.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns `NonceStoreError` if the transaction fails; nothing is removed
    /// in that case.
    pub fn purge_expired(&self, now: u64) -> Result<usize, NonceStoreError> {
        Self::purge_expired_blocking(&self.db, now)
    }

    fn purge_expired_blocking(db: &Database, now: u64) -> Result<usize, NonceStoreError> {
        let txn = db.begin_write().map_err(backend)?;
        let purged = {
            let mut table = txn.open_table(NONCES).map_err(backend)?;

            let mut expired = Vec::new();
            for entry in table.iter().map_err(backend)? {
                let (key, value) = entry.map_err(backend)?;
                let (_, expires_at) = decode_value(value.value())?;
                if now >= expires_at {
                    expired.push(key.value().to_vec());
                }
            }

            for key in &expired {
                table.remove(key.as_slice()).map_err(backend)?;
            }
            expired.len()
        };
        txn.commit().map_err(backend)?;

        Ok(purged)
    }

    /// Stored record for a pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `NonceStoreError` if the read fails or the record is corrupt.
    pub fn get(&self, device_id: &str, nonce: &str) -> Result<Option<NonceRecord>, NonceStoreError> {
        let key = encode_key(device_id, nonce)?;

        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(NONCES).map_err(backend)?;

        let Some(value) = table.get(key.as_slice()).map_err(backend)? else {
            return Ok(None);
        };
        let (first_seen_at, expires_at) = decode_value(value.value())?;

        Ok(Some(NonceRecord {
            device_id: device_id.to_owned(),
            nonce: nonce.to_owned(),
            first_seen_at,
            expires_at,
        }))
    }

    /// Number of stored records, live or not yet purged.
    ///
    /// # Errors
    ///
    /// Returns `NonceStoreError` if the read fails.
    pub fn len(&self) -> Result<usize, NonceStoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(NONCES).map_err(backend)?;

        let mut count = 0;
        for entry in table.iter().map_err(backend)? {
            entry.map_err(backend)?;
            count += 1;
        }
        Ok(count)
    }

    fn check_and_set_blocking(db: &Database, record: &NonceRecord) -> Result<NonceClaim, NonceStoreError> {
        let key = encode_key(&record.device_id, &record.nonce)?;

        let txn = db.begin_write().map_err(backend)?;
        {
            let mut table = txn.open_table(NONCES).map_err(backend)?;

            let existing = match table.get(key.as_slice()).map_err(backend)? {
                Some(value) => Some(decode_value(value.value())?),
                None => None,
            };

            if let Some((first_seen_at, expires_at)) = existing {
                if record.first_seen_at < expires_at {
                    // Dropping the transaction aborts it; nothing was written.
                    return Ok(NonceClaim::Replayed { first_seen_at });
                }
            }

            let value = encode_value(record.first_seen_at, record.expires_at);
            table.insert(key.as_slice(), value.as_slice()).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;

        Ok(NonceClaim::Accepted)
    }
}

#[async_trait]
impl NonceStore for RedbNonceStore {
    async fn check_and_set(&self, record: NonceRecord) -> Result<NonceClaim, NonceStoreError> {
        let db = Arc::clone(&self.db);
        let sweep = self.sweep.claim(record.first_seen_at);

        tokio::task::spawn_blocking(move || {
            if sweep {
                // A failed sweep leaves records for the next one; the claim
                // decides on its own.
                match Self::purge_expired_blocking(&db, record.first_seen_at) {
                    Ok(0) => {},
                    Ok(purged) => tracing::debug!(purged, "swept expired nonce records"),
                    Err(err) => tracing::warn!(error = %err, "nonce sweep failed"),
                }
            }
            Self::check_and_set_blocking(&db, &record)
        })
            .await
            .map_err(|e| NonceStoreError::Backend(format!("nonce store task failed: {e}")))?
    }
}

fn backend(err: impl std::fmt::Display) -> NonceStoreError {
    NonceStoreError::Backend(err.to_string())
}

/// Encode `(device_id, nonce)` without ambiguity between the two parts.
fn encode_key(device_id: &str, nonce: &str) -> Result<Vec<u8>, NonceStoreError> {
    let len = u16::try_from(device_id.len())
        .map_err(|_| NonceStoreError::Corrupt(format!("device id of {} bytes", device_id.len())))?;

    let mut key = Vec::with_capacity(2 + device_id.len() + nonce.len());
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(device_id.as_bytes());
    key.extend_from_slice(nonce.as_bytes());
    Ok(key)
}

fn encode_value(first_seen_at: u64, expires_at: u64) -> [u8; 16] {
    let mut value = [0u8; 16];
    value[..8].copy_from_slice(&first_seen_at.to_be_bytes());
    value[8..].copy_from_slice(&expires_at.to_be_bytes());
    value
}

fn decode_value(bytes: &[u8]) -> Result<(u64, u64), NonceStoreError> {
    let value: [u8; 16] = bytes
        .try_into()
        .map_err(|_| NonceStoreError::Corrupt(format!("nonce value of {} bytes", bytes.len())))?;

    let mut first_seen_at = [0u8; 8];
    let mut expires_at = [0u8; 8];
    first_seen_at.copy_from_slice(&value[..8]);
    expires_at.copy_from_slice(&value[8..]);

    Ok((u64::from_be_bytes(first_seen_at), u64::from_be_bytes(expires_at)))
}
