//! Secure storage capability behind the secret bridge

use crate::error::StoreError;

/// A keyed store reachable only by processes of the same installation and user.
///
/// Implementations must make `publish` an atomic overwrite and must not hold
/// handles open between calls.
pub trait SecretStore: Send + Sync {
    /// Replace the value stored under `key`
    fn publish(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Read the value stored under `key`, `None` when absent
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn clear(&self, key: &str) -> Result<(), StoreError>;

    /// Short name used in log lines
    fn name(&self) -> &'static str;
}
