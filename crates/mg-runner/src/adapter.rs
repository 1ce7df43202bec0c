//! Tunnel process adapter
//!
//! Reacts to the two triggers the orchestrator sends (start and stop) and
//! answers status probes. The bridged configuration is read at start and never
//! cached: every start sees whatever the orchestrator published last.

use std::sync::Arc;

use tokio::sync::Mutex;

use mg_core::error::{BridgeError, TunnelError};
use mg_core::SecretBridge;
use mg_protocol::{ControlErrorKind, RunnerStatus};

use crate::engine::{EngineConfig, EngineHandle, TunnelEngine};

pub struct TunnelAdapter {
    bridge: SecretBridge,
    engine: Arc<dyn TunnelEngine>,
    handle: Mutex<Option<EngineHandle>>,
}

impl TunnelAdapter {
    pub fn new(bridge: SecretBridge, engine: Arc<dyn TunnelEngine>) -> Self {
        Self {
            bridge,
            engine,
            handle: Mutex::new(None),
        }
    }

    /// Read the bridge, build the engine description and start the engine.
    ///
    /// Bridge failures never reach the engine. Engine failures are returned
    /// with the engine's message unchanged.
    pub async fn start(&self) -> Result<(), TunnelError> {
        let bridge = self.bridge.clone();
        let config = tokio::task::spawn_blocking(move || bridge.fetch())
            .await
            .map_err(|e| TunnelError::Configuration(format!("bridge read aborted: {}", e)))?
            .map_err(|e: BridgeError| {
                tracing::error!("Cannot read tunnel configuration: {}", e);
                TunnelError::from(e)
            })?;

        let description = EngineConfig::from_tunnel_config(&config).map_err(|e| {
            tracing::error!("Bridged configuration rejected: {}", e);
            TunnelError::InvalidConfiguration(e.to_string())
        })?;

        let mut handle = self.handle.lock().await;
        if let Some(previous) = handle.take() {
            tracing::warn!("Engine already running on {}, restarting", previous.interface);
            if let Err(e) = self.engine.stop(previous).await {
                tracing::warn!("Failed to stop previous engine: {}", e);
            }
        }

        let started = self
            .engine
            .start(description)
            .await
            .map_err(|e| TunnelError::Engine(e.0))?;

        tracing::info!("Tunnel engine started on {}", started.interface);
        *handle = Some(started);
        Ok(())
    }

    /// Stop the engine. Never fails: engine errors are logged.
    pub async fn stop(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            tracing::debug!("Stop requested with no engine running");
            return;
        };

        let interface = handle.interface.clone();
        match self.engine.stop(handle).await {
            Ok(()) => tracing::info!("Tunnel engine on {} stopped", interface),
            Err(e) => tracing::warn!("Engine reported an error while stopping: {}", e),
        }
    }

    pub async fn status(&self) -> RunnerStatus {
        if self.handle.lock().await.is_some() {
            RunnerStatus::Connected
        } else {
            RunnerStatus::Disconnected
        }
    }
}

/// Control-channel error kind for an adapter failure
pub fn error_kind(error: &TunnelError) -> ControlErrorKind {
    match error {
        TunnelError::Configuration(_) => ControlErrorKind::Configuration,
        TunnelError::InvalidConfiguration(_) => ControlErrorKind::InvalidConfiguration,
        TunnelError::Engine(_) | TunnelError::Unavailable(_) => ControlErrorKind::Engine,
    }
}
