//! Device records as seen by the authentication core.
//!
//! Devices are created and persisted by an external registry. The core only
//! reads two things from it: the HMAC signing secret and whether the device
//! is still active.

use std::{fmt, sync::Arc};

use zeroize::Zeroize;

/// Lifecycle status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Device may authenticate
    Active,
    /// Device is blocked; every request fails closed
    Revoked,
}

/// Per-device HMAC signing secret.
///
/// Zeroized on drop and redacted from `Debug`.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Wrap secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Secret bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

impl Drop for SigningSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A registered trading terminal.
#[derive(Debug, Clone)]
pub struct Device {
    /// Opaque device identifier (the `X-Device-Id` header value)
    pub id: String,
    /// HMAC signing secret shared with the terminal
    pub signing_secret: SigningSecret,
    /// Current status
    pub status: DeviceStatus,
    /// Unix seconds when the device was registered
    pub created_at: u64,
    /// Unix seconds of the last status change
    pub updated_at: u64,
}

impl Device {
    /// Create an active device.
    pub fn new(id: impl Into<String>, signing_secret: SigningSecret, created_at: u64) -> Self {
        Self {
            id: id.into(),
            signing_secret,
            status: DeviceStatus::Active,
            created_at,
            updated_at: created_at,
        }
    }

    /// Whether the device may authenticate.
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// Read access to the external device registry.
///
/// Lookups must reflect the registry's current state: a device revoked a
/// moment ago must not be served from a stale copy.
pub trait DeviceRegistry: Send + Sync + 'static {
    /// Look up a device by id. `None` if unknown.
    fn lookup(&self, device_id: &str) -> Option<Device>;
}

impl<T: DeviceRegistry + ?Sized> DeviceRegistry for Arc<T> {
    fn lookup(&self, device_id: &str) -> Option<Device> {
        (**self).lookup(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_is_active() {
        let device = Device::new("dev-1", SigningSecret::new(b"s".to_vec()), 1000);

        assert!(device.is_active());
        assert_eq!(device.created_at, device.updated_at);
    }

    #[test]
    fn revoked_device_is_inactive() {
        let mut device = Device::new("dev-1", SigningSecret::new(b"s".to_vec()), 1000);
        device.status = DeviceStatus::Revoked;

        assert!(!device.is_active());
    }

    #[test]
    fn debug_redacts_secret() {
        let device = Device::new("dev-1", SigningSecret::new(b"hunter2".to_vec()), 0);
        let rendered = format!("{device:?}");

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
