//! Tunnel engine seam
//!
//! The engine owns the actual packet path. The runner only builds an
//! [`EngineConfig`] and hands it over; engine errors travel back to the
//! orchestrator verbatim.

mod description;
mod dry_run;

use async_trait::async_trait;
use thiserror::Error;

pub use description::{DescriptionError, EngineConfig, IpBlock, KeyMaterial, PeerDescription};
pub use dry_run::DryRunEngine;

/// Failure reported by the tunnel engine. The message is passed through unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

/// A running tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHandle {
    pub id: u64,
    /// Name of the tunnel interface, e.g. `mg0`
    pub interface: String,
}

#[async_trait]
pub trait TunnelEngine: Send + Sync {
    async fn start(&self, config: EngineConfig) -> Result<EngineHandle, EngineError>;

    async fn stop(&self, handle: EngineHandle) -> Result<(), EngineError>;
}
