//! Secret bridge
//!
//! Carries exactly one live [`TunnelConfig`] from the orchestrator process to the
//! tunnel-runner process. The two never share memory; the only shared state is a
//! single entry in a [`SecretStore`] that both processes of the same installation can
//! reach and nothing else can. The orchestrator is the only writer, the runner the
//! only reader.

mod file;
mod keychain;
mod memory;

pub use file::FileSecretStore;
pub use keychain::KeyringSecretStore;
pub use memory::MemorySecretStore;

use mg_protocol::TunnelConfig;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::config::BridgeBackend;
use crate::error::{BridgeError, StoreError};
use crate::traits::SecretStore;

/// Key of the bridge entry for the installation rooted at `state_dir`
pub fn installation_key(state_dir: &Path) -> String {
    let digest = Sha256::digest(state_dir.to_string_lossy().as_bytes());
    format!("tunnel-config-{}", &hex::encode(digest)[..16])
}

/// Open the store selected by `backend` for the installation rooted at `state_dir`
pub fn open_store(backend: BridgeBackend, state_dir: &Path) -> Arc<dyn SecretStore> {
    match backend {
        BridgeBackend::File => Arc::new(FileSecretStore::new(state_dir.join("bridge"))),
        BridgeBackend::Keyring => Arc::new(KeyringSecretStore::default()),
    }
}

/// The single well-known bridge entry of one installation
#[derive(Clone)]
pub struct SecretBridge {
    store: Arc<dyn SecretStore>,
    key: String,
}

impl std::fmt::Debug for SecretBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBridge")
            .field("store", &self.store.name())
            .field("key", &self.key)
            .finish()
    }
}

impl SecretBridge {
    pub fn new(store: Arc<dyn SecretStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Bridge for the installation rooted at `state_dir`
    pub fn for_installation(backend: BridgeBackend, state_dir: &Path) -> Self {
        Self::new(open_store(backend, state_dir), installation_key(state_dir))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Atomically replace the bridged configuration
    pub fn publish(&self, config: &TunnelConfig) -> Result<(), BridgeError> {
        let encoded = serde_json::to_string(config)
            .map_err(|e| BridgeError::Write(StoreError::backend("json", e.to_string())))?;

        self.store
            .publish(&self.key, &encoded)
            .map_err(BridgeError::Write)?;

        tracing::info!(
            "Published tunnel configuration ({} peer(s)) via {} store",
            config.peers.len(),
            self.store.name()
        );
        Ok(())
    }

    /// Read and decode the bridged configuration
    pub fn fetch(&self) -> Result<TunnelConfig, BridgeError> {
        let encoded = self
            .store
            .fetch(&self.key)
            .map_err(BridgeError::Unreadable)?
            .ok_or(BridgeError::Missing)?;

        serde_json::from_str(&encoded).map_err(|e| BridgeError::Invalid(e.to_string()))
    }

    /// Remove the bridged configuration. Failures are logged, never returned.
    pub fn clear(&self) {
        match self.store.clear(&self.key) {
            Ok(()) => tracing::debug!("Cleared bridge entry {}", self.key),
            Err(e) => tracing::warn!("Failed to clear bridge entry {}: {}", self.key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[Interface]
PrivateKey = cHJpdmF0ZS1rZXktbWF0ZXJpYWwtMzItYnl0ZXMhIQ==
Address = 10.100.0.2/32

[Peer]
PublicKey = cHVibGljLWtleS1tYXRlcmlhbC0zMi1ieXRlcyEhIQ==
AllowedIPs = 10.100.0.0/24
";

    struct BrokenStore;

    impl SecretStore for BrokenStore {
        fn publish(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::backend("broken", "read-only"))
        }
        fn fetch(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::backend("broken", "locked"))
        }
        fn clear(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::backend("broken", "locked"))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_publish_then_fetch() {
        let store = MemorySecretStore::new();
        let bridge = SecretBridge::new(Arc::new(store.clone()), "tunnel-config-test");
        let config: TunnelConfig = SAMPLE.parse().unwrap();

        bridge.publish(&config).unwrap();
        assert_eq!(bridge.fetch().unwrap(), config);
        assert_eq!(store.len(), 1);

        bridge.clear();
        assert!(matches!(bridge.fetch(), Err(BridgeError::Missing)));
    }

    #[test]
    fn test_invalid_entry() {
        let store = MemorySecretStore::new();
        store.publish("k", "[Interface]\nnot json").unwrap();
        let bridge = SecretBridge::new(Arc::new(store), "k");

        assert!(matches!(bridge.fetch(), Err(BridgeError::Invalid(_))));
    }

    #[test]
    fn test_store_failures() {
        let bridge = SecretBridge::new(Arc::new(BrokenStore), "k");
        let config: TunnelConfig = SAMPLE.parse().unwrap();

        assert!(matches!(bridge.publish(&config), Err(BridgeError::Write(_))));
        assert!(matches!(bridge.fetch(), Err(BridgeError::Unreadable(_))));
        // Must not panic or return anything
        bridge.clear();
    }

    #[test]
    fn test_installation_key() {
        let a = installation_key(Path::new("/home/a/.config/meshgate"));
        let b = installation_key(Path::new("/home/b/.config/meshgate"));

        assert!(a.starts_with("tunnel-config-"));
        assert_eq!(a.len(), "tunnel-config-".len() + 16);
        assert_ne!(a, b);
        assert_eq!(a, installation_key(Path::new("/home/a/.config/meshgate")));
    }
}
