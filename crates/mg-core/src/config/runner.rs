//! Tunnel runner configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{BridgeBackend, DEFAULT_CONTROL_PORT};

/// Configuration for the isolated tunnel-runner process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Localhost port for the control socket
    pub control_port: u16,

    /// Directory holding the control token and the file bridge.
    /// Must match the orchestrator's `state_dir`.
    pub state_dir: PathBuf,

    /// Where to read the bridged tunnel configuration from
    pub bridge: BridgeBackend,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            control_port: DEFAULT_CONTROL_PORT,
            state_dir: super::default_config_dir(),
            bridge: BridgeBackend::default(),
        }
    }
}

impl RunnerConfig {
    pub fn control_address(&self) -> String {
        format!("127.0.0.1:{}", self.control_port)
    }
}
