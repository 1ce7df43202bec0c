//! Tunnel management facility contract

use async_trait::async_trait;
use mg_protocol::RunnerStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::error::TunnelError;

/// Status reported by the tunnel-management facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
    /// The tunnel profile is unusable
    Invalid,
    /// The tunnel is re-establishing after a network change
    Reasserting,
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunnelStatus::Connected => "connected",
            TunnelStatus::Connecting => "connecting",
            TunnelStatus::Disconnected => "disconnected",
            TunnelStatus::Disconnecting => "disconnecting",
            TunnelStatus::Invalid => "invalid",
            TunnelStatus::Reasserting => "reasserting",
        };
        f.write_str(s)
    }
}

/// Starts and stops the isolated tunnel runner.
///
/// `start` and `stop` only signal intent. Whether the tunnel actually came up or went
/// down is reported asynchronously through `subscribe`.
#[async_trait]
pub trait TunnelController: Send + Sync {
    /// Ask the facility to start the tunnel from the bridged configuration
    async fn start(&self) -> Result<(), TunnelError>;

    /// Ask the facility to stop the tunnel
    async fn stop(&self) -> Result<(), TunnelError>;

    /// Subscribe to status change notifications
    fn subscribe(&self) -> broadcast::Receiver<TunnelStatus>;

    /// Fallback liveness probe sent straight to the runner
    async fn probe(&self) -> Result<RunnerStatus, TunnelError>;
}
