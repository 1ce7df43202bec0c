//! Orchestrator-side (client) configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use super::{BridgeBackend, DEFAULT_CONTROL_PORT};

pub(crate) const DEFAULT_API_BASE_URL: &str = "https://ple7.com";

/// Configuration for the process that runs the session orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the mesh API
    pub api_base_url: String,

    /// Bearer token for the mesh API. The CLI also reads `MESHGATE_TOKEN`.
    pub api_token: Option<String>,

    /// Name this machine registers under (defaults to the host name)
    pub device_name: Option<String>,

    /// Localhost port the tunnel runner listens on for control requests
    pub control_port: u16,

    /// Explicit path to the `mg-runner` binary
    pub runner_path: Option<PathBuf>,

    /// Directory holding the control token and the file bridge
    pub state_dir: PathBuf,

    /// Where the tunnel configuration is bridged to the runner
    pub bridge: BridgeBackend,

    /// How long to keep retrying the runner's control socket after spawning it
    #[serde(with = "duration_secs")]
    pub start_timeout: Duration,

    /// Capacity of the orchestrator's command channel
    pub status_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            device_name: None,
            control_port: DEFAULT_CONTROL_PORT,
            runner_path: None,
            state_dir: super::default_config_dir(),
            bridge: BridgeBackend::default(),
            start_timeout: Duration::from_secs(10),
            status_channel_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Get the device name, falling back to hostname
    pub fn device_name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned())
    }

    /// Get the runner control address (localhost:port)
    pub fn control_address(&self) -> String {
        format!("127.0.0.1:{}", self.control_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_name_override() {
        let config = ClientConfig {
            device_name: Some("workstation".to_string()),
            ..Default::default()
        };
        assert_eq!(config.device_name(), "workstation");
        assert!(!ClientConfig::default().device_name().is_empty());
    }

    #[test]
    fn test_control_address() {
        let config = ClientConfig::default();
        assert_eq!(config.control_address(), "127.0.0.1:22240");
    }
}
