//! Fully wired gates and simulated terminals.

use std::sync::Arc;

use signalgate_core::{
    AuthError, AuthenticatedContext, Device, DeviceAuthGate, DeviceKeyManager, Environment,
    GateConfig, GateError, MasterSecret, RequestParts, RequestSigner, ResponseBody, SignalEnvelope,
    SigningSecret, generate_nonce,
};
use signalgate_proto::{ProtocolError, SignedHeaders};
use signalgate_server::{MemoryDeviceRegistry, MemoryNonceStore, RegistryError};
use thiserror::Error;

use crate::sim_env::SimEnv;

/// Master KDF secret shared by every fixture.
pub const MASTER_SECRET: &[u8] = b"signalgate-harness-master-secret";

/// Gate over simulated time and in-memory state.
pub type SimGate = DeviceAuthGate<SimEnv, MemoryNonceStore, Arc<MemoryDeviceRegistry>>;

/// Errors from harness helpers (never from the gate under test).
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Request could not be built
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Sealing or opening failed on the terminal side
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Registry rejected the operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] signalgate_core::ConfigError),
}

/// A request as it would arrive over the wire.
///
/// Fields are public so tests can tamper with any part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Authentication headers
    pub headers: SignedHeaders,
    /// Raw body bytes (sealed envelope JSON when encrypted)
    pub body: Vec<u8>,
}

impl SignedRequest {
    /// Header pairs as a transport would hand them over.
    pub fn header_pairs(&self) -> Vec<(&str, &str)> {
        self.headers.to_pairs().to_vec()
    }
}

/// A simulated trading terminal.
///
/// Derives its keys independently from the server, the way a provisioned
/// terminal does.
pub struct TestDevice {
    env: SimEnv,
    signer: RequestSigner,
    envelope: SignalEnvelope<SimEnv>,
}

impl TestDevice {
    /// Terminal for `device_id` with its own key manager.
    ///
    /// # Errors
    ///
    /// `Config` if the harness master secret is rejected.
    pub fn new(
        env: SimEnv,
        device_id: &str,
        secret: &[u8],
        config: &GateConfig,
    ) -> Result<Self, HarnessError> {
        let keys = DeviceKeyManager::new(MasterSecret::new(MASTER_SECRET)?, config);
        Ok(Self {
            signer: RequestSigner::new(device_id, SigningSecret::new(secret)),
            envelope: SignalEnvelope::new(env.clone(), Arc::new(keys)),
            env,
        })
    }

    /// Device id.
    pub fn id(&self) -> &str {
        self.signer.device_id()
    }

    /// Sign a request at the current simulated time with a fresh nonce.
    ///
    /// # Errors
    ///
    /// `Protocol` if the method or path is invalid.
    pub fn request(&self, method: &str, path: &str, body: &[u8]) -> Result<SignedRequest, HarnessError> {
        let nonce = generate_nonce(&self.env);
        self.request_with(method, path, self.env.wall_clock_secs(), &nonce, body)
    }

    /// Sign a request with an explicit timestamp and nonce.
    ///
    /// # Errors
    ///
    /// `Protocol` if the method or path is invalid.
    pub fn request_with(
        &self,
        method: &str,
        path: &str,
        timestamp: u64,
        nonce: &str,
        body: &[u8],
    ) -> Result<SignedRequest, HarnessError> {
        let headers = self.signer.sign(method, path, timestamp, nonce, body)?;
        Ok(SignedRequest { method: method.to_string(), path: path.to_string(), headers, body: body.to_vec() })
    }

    /// Seal `plaintext` into envelope JSON under this terminal's current key.
    ///
    /// # Errors
    ///
    /// `Auth` if no key is available.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, HarnessError> {
        Ok(self.envelope.encrypt(self.id(), plaintext)?.to_wire().to_json()?)
    }

    /// Seal `plaintext` and sign the resulting body.
    ///
    /// # Errors
    ///
    /// As [`Self::seal`] and [`Self::request`].
    pub fn sealed_request(
        &self,
        method: &str,
        path: &str,
        plaintext: &[u8],
    ) -> Result<SignedRequest, HarnessError> {
        let body = self.seal(plaintext)?;
        self.request(method, path, &body)
    }

    /// Read a response body produced by the gate.
    ///
    /// # Errors
    ///
    /// `Auth` if a sealed body does not open under this terminal's keys.
    pub fn open_response(&self, body: ResponseBody) -> Result<Vec<u8>, HarnessError> {
        match body {
            ResponseBody::Sealed(wire) => Ok(self.envelope.open_wire(self.id(), &wire)?),
            ResponseBody::Plain(bytes) => Ok(bytes),
        }
    }
}

/// A gate with fixed secrets, simulated time and in-memory state.
pub struct GateFixture {
    /// Shared simulated environment
    pub env: SimEnv,
    /// Gate under test
    pub gate: SimGate,
    config: GateConfig,
    registry: Arc<MemoryDeviceRegistry>,
}

impl GateFixture {
    /// Fixture at the simulation epoch with RNG seed 0.
    ///
    /// # Errors
    ///
    /// `Config` if `config` is invalid.
    pub fn new(config: GateConfig) -> Result<Self, HarnessError> {
        Self::with_env(config, SimEnv::default())
    }

    /// Fixture over an explicit environment.
    ///
    /// # Errors
    ///
    /// `Config` if `config` is invalid.
    pub fn with_env(config: GateConfig, env: SimEnv) -> Result<Self, HarnessError> {
        config.validate()?;
        let keys = Arc::new(DeviceKeyManager::new(MasterSecret::new(MASTER_SECRET)?, &config));
        let registry = Arc::new(MemoryDeviceRegistry::with_keys(Arc::clone(&keys)));
        let gate = DeviceAuthGate::new(
            env.clone(),
            config.clone(),
            keys,
            MemoryNonceStore::new(),
            Arc::clone(&registry),
        );

        Ok(Self { env, gate, config, registry })
    }

    /// Register an active device and return its terminal.
    ///
    /// The signing secret is derived from the id, so re-registering the same
    /// id in another fixture yields the same terminal.
    ///
    /// # Errors
    ///
    /// `Registry` if the id is already registered.
    pub fn register(&self, device_id: &str) -> Result<TestDevice, HarnessError> {
        let secret = format!("signing-secret-for-{device_id}").into_bytes();
        self.registry.register(Device::new(
            device_id,
            SigningSecret::new(secret.clone()),
            self.env.wall_clock_secs(),
        ))?;
        TestDevice::new(self.env.clone(), device_id, &secret, &self.config)
    }

    /// Device registry.
    pub fn registry(&self) -> &MemoryDeviceRegistry {
        &self.registry
    }

    /// Nonce store behind the gate.
    pub fn store(&self) -> &MemoryNonceStore {
        self.gate.store()
    }

    /// Deliver a request to the gate.
    ///
    /// # Errors
    ///
    /// Whatever the gate returns.
    pub async fn send(&self, request: &SignedRequest) -> Result<AuthenticatedContext, GateError> {
        let pairs = request.header_pairs();
        let parts = RequestParts { method: &request.method, path: &request.path, headers: &pairs };
        self.gate.authenticate(&parts, &request.body).await
    }
}
