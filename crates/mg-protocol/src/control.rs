//! Control messages between the orchestrator process and the tunnel runner

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request sent to the tunnel-runner process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Present the installation's control token. Must be the first request.
    Authenticate { token: String },
    /// Read the bridged configuration and start the engine
    Start,
    /// Stop the engine
    Stop,
    /// Liveness probe
    Status,
}

impl ControlRequest {
    /// Parse the textual form of a request (`"start"`, `"stop"`, `"status"`)
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Response from the tunnel-runner process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    /// Token accepted
    Authenticated,
    /// Engine started
    Started,
    /// Engine stopped (also sent when there was nothing to stop)
    Stopped,
    /// Answer to a status probe
    Status(RunnerStatus),
    /// Request failed
    Error {
        kind: ControlErrorKind,
        message: String,
    },
}

impl ControlResponse {
    /// Build an error response
    pub fn error(kind: ControlErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

/// Whether the runner currently holds an engine handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerStatus {
    Connected,
    Disconnected,
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Connected => "connected",
            RunnerStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure categories reported over the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlErrorKind {
    /// Missing or wrong token
    Unauthorized,
    /// Bridge empty or unreadable
    Configuration,
    /// Bridge entry present but not decodable
    InvalidConfiguration,
    /// Tunnel engine failure, message passed through verbatim
    Engine,
}

impl fmt::Display for ControlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlErrorKind::Unauthorized => write!(f, "unauthorized"),
            ControlErrorKind::Configuration => write!(f, "configuration error"),
            ControlErrorKind::InvalidConfiguration => write!(f, "invalid configuration"),
            ControlErrorKind::Engine => write!(f, "engine error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_form() {
        assert_eq!(ControlRequest::from_text("status"), Some(ControlRequest::Status));
        assert_eq!(ControlRequest::from_text("reboot"), None);
        assert_eq!(RunnerStatus::Connected.to_string(), "connected");
        assert_eq!(RunnerStatus::Disconnected.to_string(), "disconnected");
    }
}
