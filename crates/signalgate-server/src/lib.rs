//! Signalgate production glue.
//!
//! Wraps [`signalgate_core`]'s gate with real resources: the system clock
//! and OS randomness, durable or in-memory nonce storage, and a device
//! registry.
//!
//! # Components
//!
//! - [`SystemEnv`]: Production environment (wall clock, OS CSPRNG)
//! - [`storage`]: Nonce stores (memory, Redb, chaos wrapper)
//! - [`MemoryDeviceRegistry`]: In-process device records
//! - [`build_gate`]: Assemble a [`ProductionGate`] from [`GateSettings`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod registry;
pub mod storage;
mod system_env;

use std::sync::Arc;

pub use registry::{MemoryDeviceRegistry, RegistryError};
use signalgate_core::{DeviceAuthGate, DeviceKeyManager, GateSettings, NonceStore};
pub use storage::{ChaoticNonceStore, MemoryNonceStore, RedbNonceStore};
pub use system_env::SystemEnv;

/// Gate wired to the system environment.
pub type ProductionGate<S = RedbNonceStore, R = Arc<MemoryDeviceRegistry>> = DeviceAuthGate<SystemEnv, S, R>;

/// Assemble a production gate from startup settings.
///
/// The master secret moves into the key manager and is dropped (zeroized)
/// with it. The gate's registry shares that key manager, so revoking a
/// device through [`DeviceAuthGate::registry`] also drops its keys.
pub fn build_gate<S: NonceStore>(settings: GateSettings, store: S) -> ProductionGate<S> {
    let GateSettings { config, master_secret } = settings;
    let keys = Arc::new(DeviceKeyManager::new(master_secret, &config));
    let registry = Arc::new(MemoryDeviceRegistry::with_keys(Arc::clone(&keys)));

    tracing::info!(
        rotate_days = config.rotate_days,
        grace_days = config.key_grace_days,
        skew_secs = config.timestamp_skew_secs,
        nonce_ttl_secs = config.nonce_ttl_secs(),
        encryption = config.encryption_enabled,
        "authentication gate ready"
    );

    DeviceAuthGate::new(SystemEnv::new(), config, keys, store, registry)
}
