//! Storage trait definitions

use async_trait::async_trait;

use crate::crypto::SecretBytes;
use crate::error::Result;
use crate::vault::Vault;

/// Where a [`Vault`] is loaded from and saved to
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Load the vault; a store that holds nothing yields an empty vault
    async fn load(&self) -> Result<Vault>;

    /// Persist the whole vault, replacing what was stored
    async fn save(&self, vault: &Vault) -> Result<()>;

    /// Human-readable location, for logs and diagnostics
    fn location(&self) -> String;
}

/// Holder of this device's pepper
///
/// Calls are synchronous: the OS keychain APIs behind it block anyway.
pub trait DeviceSecretStore: Send + Sync {
    /// The stored pepper, `None` if none was ever stored
    fn get(&self) -> Result<Option<SecretBytes>>;

    /// Store (or replace) the pepper
    fn set(&self, pepper: &SecretBytes) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
