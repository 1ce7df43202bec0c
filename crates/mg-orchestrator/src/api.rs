//! HTTP client for the mesh backend
//!
//! Every failure, whether transport, HTTP status or decoding, is reported as
//! [`BackendError::Network`] carrying a readable message.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use mg_core::error::BackendError;
use mg_core::traits::BackendClient;
use mg_core::types::{
    Device, DeviceId, ExitNodeAssignment, ExitNodeSelection, Network, NetworkId, Platform, Relay,
};

/// Response of `GET /api/mesh/devices/{id}/config`
#[derive(Debug, Deserialize)]
struct DeviceConfigResponse {
    config: String,
    #[serde(rename = "hasPrivateKey")]
    has_private_key: bool,
}

/// [`BackendClient`] over the mesh REST API with bearer-token auth
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        token: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            token,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::Response, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Network(format!("Failed to {}: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status.to_string()
            } else {
                format!("{}: {}", status, body.trim())
            };
            return Err(BackendError::Network(format!("Failed to {} ({})", what, detail)));
        }

        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        self.execute(builder, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::Network(format!("Failed to parse response: {}", e)))
    }
}

fn with_network(mut device: Device, network: &NetworkId) -> Device {
    if device.network_id.as_str().is_empty() {
        device.network_id = network.clone();
    }
    device
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn register_device(
        &self,
        network: &NetworkId,
        device_name: &str,
    ) -> Result<Device, BackendError> {
        let body = serde_json::json!({
            "deviceName": device_name,
            "platform": Platform::current().as_str(),
        });
        let builder = self
            .request(Method::POST, &format!("/api/mesh/networks/{}/auto-register", network))
            .json(&body);

        let device: Device = self.fetch_json(builder, "register device").await?;
        tracing::info!("Registered device {} ({}) on network {}", device.name, device.id, network);
        Ok(with_network(device, network))
    }

    async fn set_exit_node(
        &self,
        network: &NetworkId,
        selection: &ExitNodeSelection,
    ) -> Result<(), BackendError> {
        let builder = self
            .request(Method::PATCH, &format!("/api/mesh/networks/{}/exit-node", network))
            .json(&selection.to_wire());

        self.execute(builder, "set exit node").await?;
        Ok(())
    }

    async fn get_exit_node(&self, network: &NetworkId) -> Result<ExitNodeSelection, BackendError> {
        let builder = self.request(Method::GET, &format!("/api/mesh/networks/{}/exit-node", network));
        let wire: ExitNodeAssignment = self.fetch_json(builder, "fetch exit node").await?;

        ExitNodeSelection::from_wire(wire).map_err(BackendError::Network)
    }

    async fn get_device_config(&self, device: &DeviceId) -> Result<String, BackendError> {
        let builder = self.request(Method::GET, &format!("/api/mesh/devices/{}/config", device));
        let response: DeviceConfigResponse = self.fetch_json(builder, "fetch device config").await?;

        if !response.has_private_key {
            return Err(BackendError::Network(format!(
                "Configuration for device {} has no private key",
                device
            )));
        }

        tracing::debug!("Fetched device config for {} (private key: [PRESENT])", device);
        Ok(response.config)
    }

    async fn list_networks(&self) -> Result<Vec<Network>, BackendError> {
        let builder = self.request(Method::GET, "/api/mesh/networks");
        self.fetch_json(builder, "fetch networks").await
    }

    async fn list_devices(&self, network: &NetworkId) -> Result<Vec<Device>, BackendError> {
        let builder = self.request(Method::GET, &format!("/api/mesh/networks/{}/devices", network));
        let devices: Vec<Device> = self.fetch_json(builder, "fetch devices").await?;

        Ok(devices
            .into_iter()
            .map(|device| with_network(device, network))
            .collect())
    }

    async fn list_relays(&self) -> Result<Vec<Relay>, BackendError> {
        let builder = self.request(Method::GET, "/api/mesh/relays");
        self.fetch_json(builder, "fetch relays").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = HttpBackend::new("https://mesh.example/", None);
        assert_eq!(backend.base_url(), "https://mesh.example");
    }

    #[test]
    fn test_device_network_filled_in() {
        let device = Device {
            id: DeviceId::new("d1"),
            name: "laptop".into(),
            ip_address: "10.0.0.2".into(),
            platform: Platform::Desktop,
            public_key: String::new(),
            is_exit_node: false,
            is_online: true,
            network_id: NetworkId::default(),
        };
        let filled = with_network(device, &NetworkId::new("n1"));
        assert_eq!(filled.network_id, NetworkId::new("n1"));
    }
}
