//! Session state

use std::fmt;

use mg_core::error::SessionError;
use mg_core::types::{Device, ExitNodeSelection, NetworkId};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Registering,
    AssigningExitNode,
    FetchingConfig,
    Publishing,
    StartingEngine,
    Connected,
    Disconnecting,
    Failed(SessionError),
}

impl SessionStatus {
    /// A new connect may begin from this status
    pub fn accepts_connect(&self) -> bool {
        matches!(self, SessionStatus::Disconnected | SessionStatus::Failed(_))
    }

    /// A tunnel start has been requested and not yet torn down
    pub fn tunnel_requested(&self) -> bool {
        matches!(
            self,
            SessionStatus::StartingEngine | SessionStatus::Connected | SessionStatus::Disconnecting
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionStatus::Failed(_))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "disconnected"),
            SessionStatus::Registering => write!(f, "registering"),
            SessionStatus::AssigningExitNode => write!(f, "assigning exit node"),
            SessionStatus::FetchingConfig => write!(f, "fetching config"),
            SessionStatus::Publishing => write!(f, "publishing"),
            SessionStatus::StartingEngine => write!(f, "starting engine"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::Disconnecting => write!(f, "disconnecting"),
            SessionStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// The orchestrator's single mutable session.
///
/// Only the session task mutates it; everyone else sees [`SessionSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct Session {
    pub status: SessionStatus,
    pub network: Option<NetworkId>,
    pub exit_node: ExitNodeSelection,
    pub device: Option<Device>,
    pub last_error: Option<SessionError>,
    /// Tunnel reported up
    pub connected: bool,
    /// Tunnel reported coming up or re-establishing
    pub connecting: bool,
}

impl Session {
    /// Drop everything tied to the current connection, keeping the network/exit choice
    pub fn clear_connection(&mut self) {
        self.device = None;
        self.connected = false;
        self.connecting = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status.clone(),
            network: self.network.clone(),
            exit_node: self.exit_node.clone(),
            device: self.device.clone(),
            last_error: self.last_error.clone(),
            connected: self.connected,
            connecting: self.connecting,
        }
    }
}

/// Read-only view of the session published to front ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Network of the current or most recent connect
    pub network: Option<NetworkId>,
    pub exit_node: ExitNodeSelection,
    /// Device registered for this session
    pub device: Option<Device>,
    pub last_error: Option<SessionError>,
    pub connected: bool,
    pub connecting: bool,
}

/// Result of a disconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Nothing to do
    AlreadyDisconnected,
    /// Stop signalled; waiting for the tunnel to report it is down
    Disconnecting,
    /// Torn down without waiting (no tunnel had been started)
    Disconnected,
    /// A connect step is in flight; the disconnect runs at the next step boundary
    Queued,
}

impl fmt::Display for DisconnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectOutcome::AlreadyDisconnected => write!(f, "already disconnected"),
            DisconnectOutcome::Disconnecting => write!(f, "disconnecting"),
            DisconnectOutcome::Disconnected => write!(f, "disconnected"),
            DisconnectOutcome::Queued => write!(f, "queued"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::types::{DeviceId, Platform};

    #[test]
    fn test_accepts_connect() {
        assert!(SessionStatus::Disconnected.accepts_connect());
        assert!(SessionStatus::Failed(SessionError::Network("down".into())).accepts_connect());
        assert!(!SessionStatus::Registering.accepts_connect());
        assert!(!SessionStatus::Connected.accepts_connect());
        assert!(!SessionStatus::Disconnecting.accepts_connect());
    }

    #[test]
    fn test_clear_connection_keeps_selection() {
        let mut session = Session {
            status: SessionStatus::Connected,
            network: Some(NetworkId::new("n1")),
            exit_node: ExitNodeSelection::Device(DeviceId::new("d1")),
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
            last_error: None,
            connected: true,
            connecting: false,
        };

        session.clear_connection();
        assert!(session.device.is_none());
        assert!(!session.connected);
        assert_eq!(session.network, Some(NetworkId::new("n1")));
        assert_eq!(session.exit_node, ExitNodeSelection::Device(DeviceId::new("d1")));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::AssigningExitNode.to_string(), "assigning exit node");
        assert_eq!(
            SessionStatus::Failed(SessionError::AlreadyInProgress).to_string(),
            "failed: A connection attempt is already in progress"
        );
    }
}
