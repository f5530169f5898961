//! Gate configuration.
//!
//! Settings are read once at startup from environment-style key/value
//! lookups. The master KDF secret is held separately in a [`MasterSecret`]
//! so it can be zeroized and never shows up in `Debug` output.

use std::fmt;

use signalgate_crypto::{KdfIterations, MIN_KDF_ITERATIONS};
use thiserror::Error;
use zeroize::Zeroize;

/// Master secret for per-device key derivation (required).
pub const ENV_KDF_SECRET: &str = "DEVICE_KEY_KDF_SECRET";
/// Rotation period in days.
pub const ENV_ROTATE_DAYS: &str = "DEVICE_KEY_ROTATE_DAYS";
/// Decrypt-only grace period for the previous key, in days.
pub const ENV_GRACE_DAYS: &str = "DEVICE_KEY_GRACE_DAYS";
/// PBKDF2 iteration count.
pub const ENV_KDF_ITERATIONS: &str = "DEVICE_KEY_KDF_ITERATIONS";
/// Allowed clock skew between device and server, in seconds.
pub const ENV_TIMESTAMP_SKEW: &str = "REQUEST_TIMESTAMP_SKEW_SECONDS";
/// Extra nonce retention beyond the skew window, in seconds.
pub const ENV_NONCE_RETENTION: &str = "NONCE_RETENTION_SECONDS";
/// Whether signal payloads are encrypted.
pub const ENV_ENABLE_ENCRYPTION: &str = "ENABLE_SIGNAL_ENCRYPTION";

/// Default rotation period.
pub const DEFAULT_ROTATE_DAYS: u32 = 90;
/// Default timestamp skew window.
pub const DEFAULT_TIMESTAMP_SKEW_SECS: u64 = 300;
/// Default nonce retention beyond the skew window.
pub const DEFAULT_NONCE_RETENTION_SECS: u64 = 300;

/// Master secrets shorter than this are accepted with a warning.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Configuration errors. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option is not set
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// An option is set to an unusable value
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// Option name
        name: &'static str,
        /// Value as given (never the master secret)
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Immutable master secret for key derivation.
///
/// Loaded once per process. Zeroized on drop and redacted from `Debug`.
#[derive(Clone)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap secret bytes.
    ///
    /// # Errors
    ///
    /// `Missing` if the secret is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConfigError::Missing(ENV_KDF_SECRET));
        }
        if bytes.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = bytes.len(),
                recommended = RECOMMENDED_SECRET_LEN,
                "master KDF secret is shorter than recommended"
            );
        }
        Ok(Self(bytes))
    }

    /// Secret bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Tunables for the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Key rotation period in days (date tags advance once per period)
    pub rotate_days: u32,
    /// How long the previous period's key stays usable for decryption
    pub key_grace_days: u32,
    /// PBKDF2 work factor
    pub kdf_iterations: KdfIterations,
    /// Maximum accepted `|now - timestamp|`
    pub timestamp_skew_secs: u64,
    /// Nonce retention beyond the skew window
    pub nonce_retention_secs: u64,
    /// Encrypt responses and require encrypted request bodies
    pub encryption_enabled: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rotate_days: DEFAULT_ROTATE_DAYS,
            key_grace_days: DEFAULT_ROTATE_DAYS,
            kdf_iterations: KdfIterations::default(),
            timestamp_skew_secs: DEFAULT_TIMESTAMP_SKEW_SECS,
            nonce_retention_secs: DEFAULT_NONCE_RETENTION_SECS,
            encryption_enabled: true,
        }
    }
}

impl GateConfig {
    /// Lifetime of a nonce record: skew window plus retention.
    ///
    /// A timestamp older than the skew window is rejected before its nonce is
    /// ever looked at, so records never need to outlive this.
    pub fn nonce_ttl_secs(&self) -> u64 {
        self.timestamp_skew_secs.saturating_add(self.nonce_retention_secs)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// `Invalid` if the rotation period is zero or the grace period exceeds
    /// one rotation period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotate_days == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_ROTATE_DAYS,
                value: self.rotate_days.to_string(),
                reason: "rotation period must be at least one day".to_string(),
            });
        }
        if self.key_grace_days > self.rotate_days {
            return Err(ConfigError::Invalid {
                name: ENV_GRACE_DAYS,
                value: self.key_grace_days.to_string(),
                reason: format!("grace period cannot exceed rotation period ({} days)", self.rotate_days),
            });
        }
        Ok(())
    }
}

/// Everything the gate needs from startup configuration.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Tunables
    pub config: GateConfig,
    /// Master KDF secret
    pub master_secret: MasterSecret,
}

impl GateSettings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`GateSettings::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary lookup function.
    ///
    /// Unset options take their defaults; the grace period defaults to the
    /// rotation period.
    ///
    /// # Errors
    ///
    /// - `Missing`: `DEVICE_KEY_KDF_SECRET` is unset or empty
    /// - `Invalid`: an option does not parse or violates its bounds
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_secret = lookup(ENV_KDF_SECRET)
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing(ENV_KDF_SECRET))
            .and_then(MasterSecret::new)?;

        let rotate_days = parse_or(&lookup, ENV_ROTATE_DAYS, DEFAULT_ROTATE_DAYS)?;
        let key_grace_days = parse_or(&lookup, ENV_GRACE_DAYS, rotate_days)?;

        let rounds = parse_or(&lookup, ENV_KDF_ITERATIONS, MIN_KDF_ITERATIONS)?;
        let kdf_iterations = KdfIterations::new(rounds).map_err(|e| ConfigError::Invalid {
            name: ENV_KDF_ITERATIONS,
            value: rounds.to_string(),
            reason: e.to_string(),
        })?;

        let config = GateConfig {
            rotate_days,
            key_grace_days,
            kdf_iterations,
            timestamp_skew_secs: parse_or(&lookup, ENV_TIMESTAMP_SKEW, DEFAULT_TIMESTAMP_SKEW_SECS)?,
            nonce_retention_secs: parse_or(
                &lookup,
                ENV_NONCE_RETENTION,
                DEFAULT_NONCE_RETENTION_SECS,
            )?,
            encryption_enabled: parse_bool_or(&lookup, ENV_ENABLE_ENCRYPTION, true)?,
        };
        config.validate()?;

        Ok(Self { config, master_secret })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value: raw, reason: "expected a boolean".to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_set() {
        let settings =
            GateSettings::from_lookup(lookup_from(&[(ENV_KDF_SECRET, "0123456789abcdef0123456789abcdef")]))
                .unwrap();

        assert_eq!(settings.config, GateConfig::default());
        assert_eq!(settings.config.nonce_ttl_secs(), 600);
        assert_eq!(settings.master_secret.expose(), b"0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(
            GateSettings::from_lookup(lookup_from(&[])).unwrap_err(),
            ConfigError::Missing(ENV_KDF_SECRET)
        );
        assert_eq!(
            GateSettings::from_lookup(lookup_from(&[(ENV_KDF_SECRET, "")])).unwrap_err(),
            ConfigError::Missing(ENV_KDF_SECRET)
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = GateSettings::from_lookup(lookup_from(&[
            (ENV_KDF_SECRET, "secret"),
            (ENV_ROTATE_DAYS, "30"),
            (ENV_GRACE_DAYS, "2"),
            (ENV_KDF_ITERATIONS, "200000"),
            (ENV_TIMESTAMP_SKEW, " 120 "),
            (ENV_NONCE_RETENTION, "60"),
            (ENV_ENABLE_ENCRYPTION, "off"),
        ]))
        .unwrap();

        assert_eq!(settings.config.rotate_days, 30);
        assert_eq!(settings.config.key_grace_days, 2);
        assert_eq!(settings.config.kdf_iterations.get(), 200_000);
        assert_eq!(settings.config.timestamp_skew_secs, 120);
        assert_eq!(settings.config.nonce_retention_secs, 60);
        assert_eq!(settings.config.nonce_ttl_secs(), 180);
        assert!(!settings.config.encryption_enabled);
    }

    #[test]
    fn grace_defaults_to_rotation_period() {
        let settings = GateSettings::from_lookup(lookup_from(&[
            (ENV_KDF_SECRET, "secret"),
            (ENV_ROTATE_DAYS, "7"),
        ]))
        .unwrap();

        assert_eq!(settings.config.key_grace_days, 7);
    }

    #[test]
    fn grace_longer_than_rotation_rejected() {
        let err = GateSettings::from_lookup(lookup_from(&[
            (ENV_KDF_SECRET, "secret"),
            (ENV_ROTATE_DAYS, "7"),
            (ENV_GRACE_DAYS, "8"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: ENV_GRACE_DAYS, .. }));
    }

    #[test]
    fn zero_rotation_rejected() {
        let err = GateSettings::from_lookup(lookup_from(&[
            (ENV_KDF_SECRET, "secret"),
            (ENV_ROTATE_DAYS, "0"),
            (ENV_GRACE_DAYS, "0"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: ENV_ROTATE_DAYS, .. }));
    }

    #[test]
    fn weak_iterations_rejected() {
        let err = GateSettings::from_lookup(lookup_from(&[
            (ENV_KDF_SECRET, "secret"),
            (ENV_KDF_ITERATIONS, "1000"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: ENV_KDF_ITERATIONS, .. }));
    }

    #[test]
    fn garbage_values_rejected() {
        for (name, value) in [
            (ENV_ROTATE_DAYS, "ninety"),
            (ENV_TIMESTAMP_SKEW, "-5"),
            (ENV_ENABLE_ENCRYPTION, "maybe"),
        ] {
            let result =
                GateSettings::from_lookup(lookup_from(&[(ENV_KDF_SECRET, "secret"), (name, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { name: n, .. }) if n == name),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let secret = MasterSecret::new("super-secret-value").unwrap();
        assert_eq!(format!("{secret:?}"), "MasterSecret(<redacted>)");
    }
}
