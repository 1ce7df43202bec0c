use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{EngineConfig, EngineError, EngineHandle, TunnelEngine};

/// Engine that only logs what it would bring up.
///
/// Used when the runner is started without a packet engine, and in tests.
#[derive(Debug)]
pub struct DryRunEngine {
    interface: String,
    next_id: AtomicU64,
}

impl DryRunEngine {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for DryRunEngine {
    fn default() -> Self {
        Self::new("mg0")
    }
}

#[async_trait]
impl TunnelEngine for DryRunEngine {
    async fn start(&self, config: EngineConfig) -> Result<EngineHandle, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            "Bringing up {} with address {} (private key: [PRESENT])",
            self.interface,
            config.address
        );
        if !config.dns.is_empty() {
            tracing::info!("  DNS: {:?}", config.dns);
        }
        for peer in &config.peers {
            tracing::info!(
                "  Peer endpoint {} allowed {} keepalive {:?}",
                peer.endpoint.as_deref().unwrap_or("(none)"),
                peer.allowed_ips
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                peer.persistent_keepalive
            );
        }

        Ok(EngineHandle {
            id,
            interface: self.interface.clone(),
        })
    }

    async fn stop(&self, handle: EngineHandle) -> Result<(), EngineError> {
        tracing::info!("Tearing down {} (handle {})", handle.interface, handle.id);
        Ok(())
    }
}
