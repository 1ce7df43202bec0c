//! mg-core: Core abstractions and configuration for meshgate
//!
//! This crate provides the domain types, error taxonomy, collaborator traits
//! and the secret bridge shared by the orchestrator, the tunnel runner and the CLI.

pub mod bridge;
pub mod config;
pub mod control_auth;
pub mod error;
pub mod traits;
pub mod types;

pub use bridge::SecretBridge;
pub use types::{Device, DeviceId, ExitNodeSelection, Network, NetworkId, Platform, Relay};
