//! Status command: probe the tunnel runner of this installation

use anyhow::Result;

use mg_core::config::ClientConfig;
use mg_core::control_auth;
use mg_orchestrator::tunnel::ControlClient;
use mg_protocol::RunnerStatus;

use crate::output::{print_info, print_success, print_warning};

pub async fn status_command(config: &ClientConfig) -> Result<()> {
    let token = match control_auth::read_token(&config.state_dir) {
        Ok(token) => token,
        Err(_) => {
            print_info("Tunnel runner has not been started on this machine");
            return Ok(());
        }
    };

    let mut client = match ControlClient::connect(&config.control_address(), &token).await {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Runner probe failed: {}", e);
            print_warning("Tunnel runner is not running");
            return Ok(());
        }
    };

    match client.status().await? {
        RunnerStatus::Connected => print_success("Tunnel is up"),
        RunnerStatus::Disconnected => print_info("Tunnel runner is idle"),
    }
    Ok(())
}
