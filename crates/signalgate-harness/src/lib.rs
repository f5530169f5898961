//! Deterministic test harness for signalgate.
//!
//! Simulated time and randomness ([`SimEnv`]), simulated terminals
//! ([`TestDevice`]) and a fully wired gate with fixed secrets
//! ([`GateFixture`]). Nothing here touches the system clock or OS RNG, so
//! every scenario replays identically from its seed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod fixture;
pub mod sim_env;

pub use fixture::{GateFixture, HarnessError, MASTER_SECRET, SignedRequest, SimGate, TestDevice};
pub use sim_env::{SIM_EPOCH, SimEnv};
