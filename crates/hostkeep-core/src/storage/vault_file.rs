//! Vault persistence backends
//!
//! The file backend stores `{version, tokens}` as JSON next to the rest of
//! the application data. Writes go through a temp file and a rename, so a
//! crash leaves either the old or the new vault, never a torn one. Two
//! processes saving at once is not coordinated: the last rename wins.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::atomic::write_atomic;
use super::VaultStore;
use crate::error::{Result, VaultError};
use crate::vault::{Vault, VAULT_VERSION};

/// Default vault file name inside the data directory
pub const VAULT_FILE_NAME: &str = "automation_tokens.json";

/// JSON file backed vault store
pub struct FileVaultStore {
    path: PathBuf,
}

impl FileVaultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(VAULT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn check_loaded(vault: &Vault) -> Result<()> {
    if vault.version > VAULT_VERSION {
        return Err(VaultError::StorageError(format!(
            "vault version {} is newer than supported version {}",
            vault.version, VAULT_VERSION
        )));
    }

    let mut seen = HashSet::new();
    for token in vault.tokens() {
        if !seen.insert(token.token_id.as_str()) {
            return Err(VaultError::StorageError(format!(
                "duplicate token id {} in vault",
                token.token_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn load(&self) -> Result<Vault> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("No vault file at {:?}, starting empty", self.path);
            return Ok(Vault::new());
        }

        let contents = tokio::fs::read(&self.path).await?;
        let mut vault: Vault = serde_json::from_slice(&contents)?;
        check_loaded(&vault)?;

        vault.version = VAULT_VERSION;
        vault.sort();

        debug!("Loaded {} token(s) from {:?}", vault.len(), self.path);
        Ok(vault)
    }

    async fn save(&self, vault: &Vault) -> Result<()> {
        let contents = serde_json::to_vec_pretty(vault)?;
        write_atomic(&self.path, &contents).await?;

        debug!("Saved {} token(s) to {:?}", vault.len(), self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process vault store
#[derive(Default)]
pub struct MemoryVaultStore {
    vault: RwLock<Vault>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn load(&self) -> Result<Vault> {
        Ok(self.vault.read().await.clone())
    }

    async fn save(&self, vault: &Vault) -> Result<()> {
        *self.vault.write().await = vault.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
