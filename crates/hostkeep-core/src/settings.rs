//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file in the data
//! directory. A missing file means defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::storage::{write_atomic, VAULT_FILE_NAME};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "HOSTKEEP_DATA_DIR";

const SETTINGS_FILE_NAME: &str = "settings.json";

/// Where the device pepper is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PepperBackend {
    /// OS keychain, falling back to a file when unavailable
    #[default]
    Keychain,
    /// Owner-only file in the data directory
    File,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Vault file location (defaults to the data directory)
    pub vault_file: Option<PathBuf>,
    pub pepper_backend: PepperBackend,
    /// Bind new tokens to this device unless told otherwise
    pub bind_to_device_by_default: bool,
    /// Usage limit for new tokens (0 = unlimited)
    pub default_max_uses: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            vault_file: None,
            pepper_backend: PepperBackend::Keychain,
            bind_to_device_by_default: false,
            default_max_uses: 0,
        }
    }
}

/// Resolve the data directory: `HOSTKEEP_DATA_DIR`, else the platform data dir
pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    ProjectDirs::from("dev", "hostkeep", "hostkeep")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| VaultError::StorageError("Could not determine data directory".to_string()))
}

/// Settings manager
pub struct SettingsManager {
    data_dir: PathBuf,
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings from `data_dir` (defaults if absent)
    pub fn new(data_dir: &Path) -> Result<Self> {
        let settings_file = data_dir.join(SETTINGS_FILE_NAME);
        let settings = Self::load_from_file(&settings_file)?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            settings_file,
            settings,
        })
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.settings)?;
        write_atomic(&self.settings_file, &contents).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Effective vault file path
    pub fn vault_path(&self) -> PathBuf {
        match &self.settings.vault_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(VAULT_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path()).unwrap();

        let settings = manager.get();
        assert_eq!(settings.pepper_backend, PepperBackend::Keychain);
        assert!(!settings.bind_to_device_by_default);
        assert_eq!(manager.vault_path(), temp_dir.path().join(VAULT_FILE_NAME));
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = SettingsManager::new(temp_dir.path()).unwrap();
            manager.get_mut().pepper_backend = PepperBackend::File;
            manager.get_mut().default_max_uses = 5;
            manager.get_mut().vault_file = Some(PathBuf::from("tokens.json"));
            manager.save().await.unwrap();
        }

        {
            let manager = SettingsManager::new(temp_dir.path()).unwrap();
            assert_eq!(manager.get().pepper_backend, PepperBackend::File);
            assert_eq!(manager.get().default_max_uses, 5);
            assert_eq!(manager.vault_path(), temp_dir.path().join("tokens.json"));
        }
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SETTINGS_FILE_NAME),
            r#"{"bindToDeviceByDefault": true}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path()).unwrap();
        assert!(manager.get().bind_to_device_by_default);
        assert_eq!(manager.get().pepper_backend, PepperBackend::Keychain);
    }
}
