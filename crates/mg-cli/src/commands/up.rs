//! `meshgate up`: connect and hold the tunnel until interrupted

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use mg_core::config::ClientConfig;
use mg_core::types::{ExitNodeSelection, NetworkId};
use mg_core::SecretBridge;
use mg_orchestrator::{
    spawn, Collaborators, DisconnectOutcome, HttpBackend, ProcessTunnelController, SessionStatus,
};

use crate::output::{format_session, print_error, print_info, print_success, print_warning};

const DISCONNECT_WAIT: Duration = Duration::from_secs(10);

pub async fn up_command(
    config: &ClientConfig,
    backend: HttpBackend,
    network: NetworkId,
    exit_node: ExitNodeSelection,
) -> Result<()> {
    let collaborators = Collaborators {
        backend: Arc::new(backend),
        bridge: SecretBridge::for_installation(config.bridge, &config.state_dir),
        tunnel: Arc::new(ProcessTunnelController::from_config(config)),
    };
    let device_name = config.device_name();
    let (orchestrator, task) = spawn(collaborators, device_name.clone(), config.status_channel_capacity);

    print_info(&format!(
        "Connecting {} to network {} (exit node: {})",
        device_name, network, exit_node
    ));

    let mut updates = orchestrator.subscribe();

    if let Err(e) = orchestrator.connect(network, exit_node).await {
        print_error(&e.user_message());
        println!("{}", format_session(&orchestrator.snapshot()));
        anyhow::bail!("connect failed");
    }

    let mut last_status = orchestrator.snapshot().status;
    if last_status == SessionStatus::Disconnected {
        // The tunnel already stopped before the first update got here
        println!("{}", format_session(&orchestrator.snapshot()));
        anyhow::bail!("tunnel stopped before it became active");
    }

    let interrupted = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break false;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.status == last_status {
                    continue;
                }
                last_status = snapshot.status.clone();

                match &snapshot.status {
                    SessionStatus::Connected => {
                        let ip = snapshot.device.as_ref().map(|d| d.ip_address.as_str()).unwrap_or("-");
                        print_success(&format!("Tunnel is up ({}). Press Ctrl+C to disconnect", ip));
                    }
                    SessionStatus::Disconnected => {
                        match &snapshot.last_error {
                            Some(error) => print_error(&error.user_message()),
                            None => print_warning("Tunnel went down"),
                        }
                        // The session task releases the exit node and bridge; the join below waits for it
                        break false;
                    }
                    other => print_info(&format!("Session {}", other)),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break true;
            }
        }
    };

    if interrupted {
        print_info("Disconnecting...");
        match orchestrator.disconnect().await? {
            DisconnectOutcome::Disconnecting | DisconnectOutcome::Queued => {
                let settled = tokio::time::timeout(
                    DISCONNECT_WAIT,
                    orchestrator.wait_for(|s| s.status == SessionStatus::Disconnected),
                )
                .await;
                match settled {
                    Ok(Ok(_)) => print_success("Disconnected"),
                    Ok(Err(e)) => print_warning(&e.user_message()),
                    Err(_) => print_warning("Timed out waiting for the tunnel to stop"),
                }
            }
            DisconnectOutcome::Disconnected | DisconnectOutcome::AlreadyDisconnected => {
                print_success("Disconnected")
            }
        }
    }

    drop(orchestrator);
    drop(updates);
    if let Err(e) = task.await {
        tracing::warn!("Session task ended abnormally: {}", e);
    }
    Ok(())
}
