//! OS keychain store
//!
//! Backed by the macOS Keychain, Windows Credential Manager or the Linux
//! Secret Service, all of which scope entries to the current user.

use crate::error::StoreError;
use crate::traits::SecretStore;

const BACKEND: &str = "keyring";

/// Stores entries as keychain passwords under a fixed service name
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(&self.service, key).map_err(|e| StoreError::backend(BACKEND, e.to_string()))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new("meshgate")
    }
}

impl SecretStore for KeyringSecretStore {
    fn publish(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::backend(BACKEND, e.to_string()))
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(inner)) => Err(StoreError::backend(
                BACKEND,
                format!("Cannot access keychain storage: {}", inner),
            )),
            Err(e) => Err(StoreError::backend(BACKEND, e.to_string())),
        }
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::backend(BACKEND, e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}
