//! In-memory device registry.
//!
//! Stands in for the external registry that owns device records. Lookups
//! always read the live map, so a revocation is visible to the very next
//! request.
//!
//! A registry built [`MemoryDeviceRegistry::with_keys`] forwards status
//! changes to the key manager: revoking a device drops its cached keys and
//! blocks derivation, reactivating it lifts the block.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use signalgate_core::{Device, DeviceKeyManager, DeviceRegistry, DeviceStatus};
use thiserror::Error;

/// Registry operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A device with this id is already registered
    #[error("device {0} already registered")]
    DuplicateDevice(String),

    /// No device with this id
    #[error("device {0} not found")]
    UnknownDevice(String),
}

/// Concurrent map of device records.
#[derive(Debug, Default)]
pub struct MemoryDeviceRegistry {
    devices: DashMap<String, Device>,
    keys: Option<Arc<DeviceKeyManager>>,
}

impl MemoryDeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that keeps `keys` in step with revocations.
    pub fn with_keys(keys: Arc<DeviceKeyManager>) -> Self {
        Self { devices: DashMap::new(), keys: Some(keys) }
    }

    /// Add a device.
    ///
    /// # Errors
    ///
    /// `DuplicateDevice` if the id is taken.
    pub fn register(&self, device: Device) -> Result<(), RegistryError> {
        match self.devices.entry(device.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateDevice(device.id)),
            Entry::Vacant(slot) => {
                tracing::info!(device_id = %device.id, "device registered");
                slot.insert(device);
                Ok(())
            },
        }
    }

    /// Mark a device revoked.
    ///
    /// # Errors
    ///
    /// `UnknownDevice` if the id is not registered.
    pub fn revoke(&self, device_id: &str, now: u64) -> Result<(), RegistryError> {
        self.set_status(device_id, DeviceStatus::Revoked, now)?;
        if let Some(keys) = &self.keys {
            keys.revoke(device_id, now);
        }
        Ok(())
    }

    /// Mark a revoked device active again.
    ///
    /// # Errors
    ///
    /// `UnknownDevice` if the id is not registered.
    pub fn reactivate(&self, device_id: &str, now: u64) -> Result<(), RegistryError> {
        self.set_status(device_id, DeviceStatus::Active, now)?;
        if let Some(keys) = &self.keys {
            keys.reinstate(device_id);
        }
        Ok(())
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn set_status(&self, device_id: &str, status: DeviceStatus, now: u64) -> Result<(), RegistryError> {
        let mut device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| RegistryError::UnknownDevice(device_id.to_owned()))?;

        device.status = status;
        device.updated_at = now;
        tracing::info!(device_id, ?status, "device status changed");
        Ok(())
    }
}

impl DeviceRegistry for MemoryDeviceRegistry {
    fn lookup(&self, device_id: &str) -> Option<Device> {
        self.devices.get(device_id).map(|device| device.value().clone())
    }
}
