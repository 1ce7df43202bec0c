//! mg-runner: isolated tunnel-runner process for meshgate
//!
//! The runner never talks to the mesh backend. It reads the tunnel configuration
//! the orchestrator published on the secret bridge, turns it into an engine-level
//! description and hands it to the tunnel engine. The orchestrator drives it over
//! an authenticated localhost control socket.

pub mod adapter;
pub mod control;
pub mod engine;

pub use adapter::TunnelAdapter;
pub use control::ControlServer;
pub use engine::{DryRunEngine, EngineConfig, EngineError, EngineHandle, TunnelEngine};
