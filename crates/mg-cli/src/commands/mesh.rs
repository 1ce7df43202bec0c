//! Read-only mesh listings and exit-node management

use anyhow::{Context, Result};

use mg_core::config::ClientConfig;
use mg_core::traits::BackendClient;
use mg_core::types::{ExitNodeSelection, NetworkId};
use mg_orchestrator::HttpBackend;

use crate::output::{format_devices, format_networks, format_relays, print_success};

/// HTTP backend for the configured API, failing early without a token
pub fn backend_from_config(config: &ClientConfig) -> Result<HttpBackend> {
    let token = config
        .api_token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .context("No API token configured. Set MESHGATE_TOKEN or api_token in the config file")?;

    Ok(HttpBackend::new(config.api_base_url.clone(), Some(token)))
}

pub async fn networks_command(backend: &dyn BackendClient, json: bool) -> Result<()> {
    let networks = backend
        .list_networks()
        .await
        .context("Failed to list networks")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&networks)?);
    } else {
        println!("{}", format_networks(&networks));
    }
    Ok(())
}

pub async fn devices_command(
    backend: &dyn BackendClient,
    network: &NetworkId,
    this_device: &str,
    json: bool,
) -> Result<()> {
    let devices = backend
        .list_devices(network)
        .await
        .with_context(|| format!("Failed to list devices of network {}", network))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        println!("{}", format_devices(&devices, this_device));
    }
    Ok(())
}

pub async fn relays_command(backend: &dyn BackendClient, json: bool) -> Result<()> {
    let relays = backend.list_relays().await.context("Failed to list relays")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&relays)?);
    } else {
        println!("{}", format_relays(&relays));
    }
    Ok(())
}

pub async fn exit_node_get(backend: &dyn BackendClient, network: &NetworkId) -> Result<()> {
    let selection = backend
        .get_exit_node(network)
        .await
        .with_context(|| format!("Failed to read the exit node of network {}", network))?;

    println!("{}", selection);
    Ok(())
}

pub async fn exit_node_set(
    backend: &dyn BackendClient,
    network: &NetworkId,
    selection: &ExitNodeSelection,
) -> Result<()> {
    backend
        .set_exit_node(network, selection)
        .await
        .with_context(|| format!("Failed to set the exit node of network {}", network))?;

    print_success(&format!("Exit node of {} set to {}", network, selection));
    Ok(())
}
