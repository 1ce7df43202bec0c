//! Mesh backend contract

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{Device, DeviceId, ExitNodeSelection, Network, NetworkId, Relay};

/// Narrow RPC surface of the mesh backend consumed by the orchestrator and CLI
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Register (or re-register) this client as a device on `network`
    async fn register_device(
        &self,
        network: &NetworkId,
        device_name: &str,
    ) -> Result<Device, BackendError>;

    /// Route the network's traffic through `selection`
    async fn set_exit_node(
        &self,
        network: &NetworkId,
        selection: &ExitNodeSelection,
    ) -> Result<(), BackendError>;

    /// Current exit-node assignment for `network`
    async fn get_exit_node(&self, network: &NetworkId) -> Result<ExitNodeSelection, BackendError>;

    /// Textual tunnel configuration for a registered device
    async fn get_device_config(&self, device: &DeviceId) -> Result<String, BackendError>;

    async fn list_networks(&self) -> Result<Vec<Network>, BackendError>;

    async fn list_devices(&self, network: &NetworkId) -> Result<Vec<Device>, BackendError>;

    async fn list_relays(&self) -> Result<Vec<Relay>, BackendError>;
}
