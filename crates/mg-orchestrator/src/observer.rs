//! Tunnel status observer
//!
//! Tunnel status notifications arrive on the controller's broadcast channel,
//! independently of anything the orchestrator is doing. They are never applied
//! where they arrive: the forwarder task funnels each one into the session task's
//! command channel, and the session task folds it into the session with [`fold`].
//!
//! Mapping of the six tunnel states onto the session's flags:
//!
//! | tunnel status               | connected | connecting |
//! |-----------------------------|-----------|------------|
//! | connected                   | true      | false      |
//! | connecting, reasserting     | false     | true       |
//! | disconnecting               | unchanged | false      |
//! | disconnected, invalid       | false     | false      |

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use mg_core::error::SessionError;
use mg_core::traits::TunnelStatus;

use crate::session::state::{Session, SessionStatus};
use crate::session::Command;

pub(crate) const STOPPED_BEFORE_ACTIVE: &str = "tunnel stopped before it became active";

/// Fold one tunnel status notification into the session.
///
/// This is the only path that moves the session from `StartingEngine` to
/// `Connected`, or from `Disconnecting` to `Disconnected`.
pub(crate) fn fold(session: &mut Session, status: TunnelStatus) {
    match status {
        TunnelStatus::Connected => {
            session.connected = true;
            session.connecting = false;
            if session.status == SessionStatus::StartingEngine {
                session.status = SessionStatus::Connected;
                tracing::info!("Tunnel is up");
            }
        }
        TunnelStatus::Connecting | TunnelStatus::Reasserting => {
            session.connected = false;
            session.connecting = true;
        }
        TunnelStatus::Disconnecting => {
            session.connecting = false;
        }
        TunnelStatus::Disconnected | TunnelStatus::Invalid => {
            session.connected = false;
            session.connecting = false;

            if !session.status.tunnel_requested() {
                // Late notification from a previous tunnel
                tracing::debug!("Ignoring tunnel {} while {}", status, session.status);
                return;
            }

            if session.status == SessionStatus::StartingEngine {
                tracing::warn!("Tunnel reported {} before becoming active", status);
                session.last_error = Some(SessionError::Engine(STOPPED_BEFORE_ACTIVE.to_string()));
            } else {
                tracing::info!("Tunnel is down");
            }

            session.status = SessionStatus::Disconnected;
            session.clear_connection();
        }
    }
}

/// Forward controller notifications into the session task until either side goes away
pub(crate) fn spawn_forwarder(
    mut statuses: broadcast::Receiver<TunnelStatus>,
    commands: mpsc::WeakSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let status = match statuses.recv().await {
                Ok(status) => status,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Status observer lagged, {} notification(s) dropped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            tracing::debug!("Tunnel status: {}", status);

            let Some(sender) = commands.upgrade() else {
                break;
            };
            if sender.send(Command::Tunnel(status)).await.is_err() {
                break;
            }
        }
        tracing::debug!("Status observer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::types::{Device, DeviceId, NetworkId, Platform};

    fn session_in(status: SessionStatus) -> Session {
        Session {
            status,
            network: Some(NetworkId::new("n1")),
            device: Some(Device {
                id: DeviceId::new("self"),
                name: "laptop".into(),
                ip_address: "10.0.0.5".into(),
                platform: Platform::Desktop,
                public_key: String::new(),
                is_exit_node: false,
                is_online: true,
                network_id: NetworkId::new("n1"),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_connected_completes_start() {
        let mut session = session_in(SessionStatus::StartingEngine);
        fold(&mut session, TunnelStatus::Connecting);
        assert!(session.connecting);
        assert_eq!(session.status, SessionStatus::StartingEngine);

        fold(&mut session, TunnelStatus::Connected);
        assert_eq!(session.status, SessionStatus::Connected);
        assert!(session.connected);
        assert!(!session.connecting);
    }

    #[test]
    fn test_reasserting_keeps_session_connected() {
        let mut session = session_in(SessionStatus::Connected);
        session.connected = true;

        fold(&mut session, TunnelStatus::Reasserting);
        assert_eq!(session.status, SessionStatus::Connected);
        assert!(session.connecting);
        assert!(!session.connected);
    }

    #[test]
    fn test_disconnected_completes_teardown() {
        let mut session = session_in(SessionStatus::Disconnecting);
        session.connected = true;

        fold(&mut session, TunnelStatus::Disconnecting);
        assert!(session.connected);
        assert!(!session.connecting);

        fold(&mut session, TunnelStatus::Disconnected);
        assert_eq!(session.status, SessionStatus::Disconnected);
        assert!(session.device.is_none());
        assert_eq!(session.network, Some(NetworkId::new("n1")));
        assert!(session.last_error.is_none());
    }

    #[test]
    fn test_invalid_while_starting() {
        let mut session = session_in(SessionStatus::StartingEngine);
        fold(&mut session, TunnelStatus::Invalid);

        assert_eq!(session.status, SessionStatus::Disconnected);
        assert_eq!(
            session.last_error,
            Some(SessionError::Engine(STOPPED_BEFORE_ACTIVE.to_string()))
        );
    }

    #[test]
    fn test_late_notification_keeps_partial_failure_device() {
        let failed = SessionStatus::Failed(SessionError::PartialFailure("503".into()));
        let mut session = session_in(failed.clone());

        fold(&mut session, TunnelStatus::Disconnected);
        assert_eq!(session.status, failed);
        assert!(session.device.is_some());
    }
}
