//! Core error types for meshgate

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the backend API.
///
/// HTTP status distinctions are folded into the message; callers only see one kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),
}

impl BackendError {
    pub fn message(&self) -> &str {
        match self {
            BackendError::Network(msg) => msg,
        }
    }
}

/// Failure of the underlying secure storage
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem-backed store failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform keychain or secret service failed
    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// Secret bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Publishing the configuration failed
    #[error("Failed to write tunnel configuration: {0}")]
    Write(#[source] StoreError),

    /// No configuration has been published
    #[error("No tunnel configuration has been published")]
    Missing,

    /// The store could not be read
    #[error("Failed to read tunnel configuration: {0}")]
    Unreadable(#[source] StoreError),

    /// An entry exists but does not decode
    #[error("Stored tunnel configuration is invalid: {0}")]
    Invalid(String),
}

/// Errors surfaced by the session orchestrator.
///
/// Each variant corresponds to a `Failed(reason)` state of the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Backend RPC failed during registration
    #[error("Network error: {0}")]
    Network(String),

    /// Exit-node assignment failed after the device was registered
    #[error("Exit node assignment failed after registration: {0}")]
    PartialFailure(String),

    /// The fetched configuration did not parse
    #[error("Invalid tunnel configuration: {0}")]
    InvalidConfiguration(String),

    /// The configuration could not be handed to the tunnel runner
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The tunnel engine refused to start
    #[error("Engine error: {0}")]
    Engine(String),

    /// A connect is already running or the session is up
    #[error("A connection attempt is already in progress")]
    AlreadyInProgress,

    /// A queued disconnect stopped the connect before the tunnel was started
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The orchestrator task has stopped
    #[error("Orchestrator has shut down")]
    Shutdown,
}

impl SessionError {
    /// Single message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Network(msg) => format!("Could not reach the mesh service: {}", msg),
            SessionError::PartialFailure(msg) => format!(
                "Device registered, but the exit node could not be set: {}",
                msg
            ),
            SessionError::InvalidConfiguration(msg) => {
                format!("The tunnel configuration from the server is invalid: {}", msg)
            }
            SessionError::Configuration(msg) => {
                format!("Could not hand the configuration to the tunnel: {}", msg)
            }
            SessionError::Engine(msg) => format!("The tunnel failed to start: {}", msg),
            SessionError::AlreadyInProgress => "Already connecting or connected".to_string(),
            SessionError::Cancelled => "Connection attempt cancelled".to_string(),
            SessionError::Shutdown => "The VPN service is not running".to_string(),
        }
    }
}

/// Tunnel controller and engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunnelError {
    /// The tunnel runner could not be reached or launched
    #[error("Tunnel runner unavailable: {0}")]
    Unavailable(String),

    /// The runner found no usable bridged configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The runner found a bridged configuration it could not decode
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The tunnel engine failed; message passed through verbatim
    #[error("{0}")]
    Engine(String),
}

impl TunnelError {
    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            TunnelError::Unavailable(msg)
            | TunnelError::Configuration(msg)
            | TunnelError::InvalidConfiguration(msg)
            | TunnelError::Engine(msg) => msg,
        }
    }
}

impl From<TunnelError> for SessionError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::Configuration(msg) => SessionError::Configuration(msg),
            TunnelError::InvalidConfiguration(msg) => SessionError::InvalidConfiguration(msg),
            TunnelError::Unavailable(msg) | TunnelError::Engine(msg) => SessionError::Engine(msg),
        }
    }
}

impl From<BridgeError> for TunnelError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Invalid(msg) => TunnelError::InvalidConfiguration(msg),
            other => TunnelError::Configuration(other.to_string()),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
