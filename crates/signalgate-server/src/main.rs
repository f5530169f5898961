//! Signalgate operator CLI.
//!
//! # Usage
//!
//! ```bash
//! # Sign a request as a device (integration testing)
//! SIGNALGATE_DEVICE_SECRET=... signalgate sign --device-id dev-1 --method GET --path /api/v1/signals
//!
//! # Show the current key window and fingerprint for a device
//! DEVICE_KEY_KDF_SECRET=... signalgate key-info --device-id dev-1
//!
//! # Validate environment configuration
//! DEVICE_KEY_KDF_SECRET=... signalgate check-config
//!
//! # Drop expired nonce records from a durable store
//! signalgate purge-nonces --db /var/lib/signalgate/nonces.redb
//! ```

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use signalgate_core::{
    DeviceKeyManager, EncryptionKey, Environment, GateSettings, RequestSigner, SigningSecret,
    generate_nonce,
};
use signalgate_server::{RedbNonceStore, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Signalgate device authentication tooling
#[derive(Parser, Debug)]
#[command(name = "signalgate")]
#[command(about = "Device authentication and signal encryption tooling")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the authentication headers for a request
    Sign {
        /// Device identifier
        #[arg(long)]
        device_id: String,

        /// Device HMAC signing secret
        #[arg(long, env = "SIGNALGATE_DEVICE_SECRET", hide_env_values = true)]
        secret: String,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path, including query string
        #[arg(long)]
        path: String,

        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the request body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Unix timestamp (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,

        /// Nonce (defaults to 16 random bytes, hex)
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Show key ids, validity windows and fingerprints for a device
    KeyInfo {
        /// Device identifier
        #[arg(long)]
        device_id: String,

        /// Unix time to evaluate at (defaults to now)
        #[arg(long)]
        at: Option<u64>,
    },

    /// Load configuration from the environment and report it
    CheckConfig,

    /// Remove expired records from a durable nonce store
    PurgeNonces {
        /// Path to the Redb nonce database
        #[arg(long)]
        db: PathBuf,

        /// Unix time to evaluate at (defaults to now)
        #[arg(long)]
        at: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let env = SystemEnv::new();
    let mut out = io::stdout().lock();

    match args.command {
        Command::Sign { device_id, secret, method, path, body, body_file, timestamp, nonce } => {
            let body = match (body, body_file) {
                (Some(body), _) => body.into_bytes(),
                (None, Some(file)) => std::fs::read(file)?,
                (None, None) => Vec::new(),
            };
            let timestamp = timestamp.unwrap_or_else(|| env.wall_clock_secs());
            let nonce = nonce.unwrap_or_else(|| generate_nonce(&env));

            let signer = RequestSigner::new(device_id, SigningSecret::new(secret));
            let headers = signer.sign(&method, &path, timestamp, &nonce, &body)?;

            for (name, value) in headers.to_pairs() {
                writeln!(out, "{name}: {value}")?;
            }
        },

        Command::KeyInfo { device_id, at } => {
            let settings = GateSettings::from_env()?;
            let now = at.unwrap_or_else(|| env.wall_clock_secs());
            let keys = DeviceKeyManager::new(settings.master_secret, &settings.config);

            let active = keys.active_key(&device_id, now)?;
            write_key(&mut out, "active", &active)?;
            match keys.get_grace_key(&device_id, now) {
                Some(grace) => write_key(&mut out, "grace", &grace)?,
                None => writeln!(out, "grace: none")?,
            }
        },

        Command::CheckConfig => {
            let settings = GateSettings::from_env()?;
            let config = &settings.config;

            writeln!(out, "master secret:      <redacted> ({} bytes)", settings.master_secret.expose().len())?;
            writeln!(out, "rotate days:        {}", config.rotate_days)?;
            writeln!(out, "grace days:         {}", config.key_grace_days)?;
            writeln!(out, "kdf iterations:     {}", config.kdf_iterations.get())?;
            writeln!(out, "timestamp skew:     {}s", config.timestamp_skew_secs)?;
            writeln!(out, "nonce retention:    {}s", config.nonce_retention_secs)?;
            writeln!(out, "nonce ttl:          {}s", config.nonce_ttl_secs())?;
            writeln!(out, "signal encryption:  {}", config.encryption_enabled)?;
        },

        Command::PurgeNonces { db, at } => {
            let store = RedbNonceStore::open(&db)?;
            let now = at.unwrap_or_else(|| env.wall_clock_secs());

            let purged = store.purge_expired(now)?;
            tracing::info!(purged, path = %db.display(), "purged expired nonce records");
            writeln!(out, "purged {purged} expired nonce records")?;
        },
    }

    Ok(())
}

/// Print key metadata. Only a truncated SHA-256 of the key is shown.
fn write_key(out: &mut impl Write, label: &str, key: &EncryptionKey) -> io::Result<()> {
    let fingerprint = hex::encode(&Sha256::digest(key.key.as_bytes())[..8]);
    writeln!(
        out,
        "{label}: id={} valid=[{}, {}) fingerprint={fingerprint}",
        key.key_id, key.created_at, key.expires_at
    )
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn sign_rejects_body_and_body_file_together() {
        let parsed = Args::try_parse_from([
            "signalgate",
            "sign",
            "--device-id",
            "dev-1",
            "--secret",
            "s",
            "--path",
            "/api/v1/signals",
            "--body",
            "{}",
            "--body-file",
            "body.json",
        ]);

        assert!(parsed.is_err());
    }

    #[test]
    fn purge_nonces_parses_time_override() {
        let args =
            Args::try_parse_from(["signalgate", "--log-level", "debug", "purge-nonces", "--db", "n.redb", "--at", "1000"])
                .unwrap();

        assert_eq!(args.log_level, "debug");
        assert!(matches!(args.command, Command::PurgeNonces { at: Some(1000), .. }));
    }
}
