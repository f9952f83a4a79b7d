//! Device pepper: file fallback, in-memory store, and first-use creation

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::atomic::write_atomic_blocking;
use super::{DeviceSecretStore, KeychainPepperStore};
use crate::crypto::SecretBytes;
use crate::error::{Result, VaultError};
use crate::settings::{PepperBackend, Settings};

/// Shortest pepper accepted from a store
pub const MIN_PEPPER_LEN: usize = 16;
/// Length of a generated pepper
pub const PEPPER_LEN: usize = 32;

/// Fallback pepper file name inside the data directory
pub const PEPPER_FILE_NAME: &str = "device_pepper";

/// Device pepper in an owner-only file
pub struct FilePepperStore {
    path: PathBuf,
}

impl FilePepperStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceSecretStore for FilePepperStore {
    fn get(&self) -> Result<Option<SecretBytes>> {
        let encoded = match std::fs::read_to_string(&self.path) {
            Ok(encoded) => encoded,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoded = STANDARD.decode(encoded.trim()).map_err(|e| {
            VaultError::StorageError(format!("corrupt pepper file {:?}: {}", self.path, e))
        })?;
        Ok(Some(SecretBytes::new(decoded)))
    }

    fn set(&self, pepper: &SecretBytes) -> Result<()> {
        write_atomic_blocking(&self.path, STANDARD.encode(pepper.expose()).as_bytes())?;
        debug!("Stored device pepper in {:?}", self.path);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Pepper File"
    }
}

/// Process-local pepper holder
#[derive(Default)]
pub struct MemoryPepperStore {
    pepper: Mutex<Option<SecretBytes>>,
}

impl MemoryPepperStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceSecretStore for MemoryPepperStore {
    fn get(&self) -> Result<Option<SecretBytes>> {
        let guard = self
            .pepper
            .lock()
            .map_err(|_| VaultError::StorageError("pepper lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn set(&self, pepper: &SecretBytes) -> Result<()> {
        let mut guard = self
            .pepper
            .lock()
            .map_err(|_| VaultError::StorageError("pepper lock poisoned".to_string()))?;
        *guard = Some(pepper.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Memory"
    }
}

/// Fetch this device's pepper, generating and storing one on first use
pub fn load_or_create_device_pepper(store: &dyn DeviceSecretStore) -> Result<SecretBytes> {
    if let Some(pepper) = store.get()? {
        if pepper.len() < MIN_PEPPER_LEN {
            return Err(VaultError::StorageError(format!(
                "device pepper in {} is shorter than {} bytes",
                store.backend_name(),
                MIN_PEPPER_LEN
            )));
        }
        return Ok(pepper);
    }

    let mut bytes = vec![0u8; PEPPER_LEN];
    OsRng.fill_bytes(&mut bytes);
    let pepper = SecretBytes::new(bytes);
    store.set(&pepper)?;

    info!("Created device pepper in {}", store.backend_name());
    Ok(pepper)
}

/// Pick the pepper backend configured in `settings`, falling back to a file
/// in `data_dir` when the keychain cannot be used
pub fn open_pepper_store(settings: &Settings, data_dir: &Path) -> Box<dyn DeviceSecretStore> {
    if settings.pepper_backend == PepperBackend::Keychain {
        let keychain = KeychainPepperStore::new();
        if keychain.is_available() {
            return Box::new(keychain);
        }
        warn!("Keychain unavailable, keeping the device pepper in a local file");
    }
    Box::new(FilePepperStore::new(data_dir.join(PEPPER_FILE_NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pepper_created_once() {
        let store = MemoryPepperStore::new();

        let first = load_or_create_device_pepper(&store).unwrap();
        let second = load_or_create_device_pepper(&store).unwrap();

        assert_eq!(first.len(), PEPPER_LEN);
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_pepper_rejected() {
        let store = MemoryPepperStore::new();
        store.set(&SecretBytes::new(vec![1; 8])).unwrap();

        assert!(matches!(
            load_or_create_device_pepper(&store),
            Err(VaultError::StorageError(_))
        ));
    }

    #[test]
    fn test_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilePepperStore::new(temp_dir.path().join(PEPPER_FILE_NAME));

        assert!(store.get().unwrap().is_none());

        let pepper = load_or_create_device_pepper(&store).unwrap();
        let reopened = FilePepperStore::new(temp_dir.path().join(PEPPER_FILE_NAME));
        assert_eq!(reopened.get().unwrap(), Some(pepper));
    }

    #[test]
    fn test_file_backend_selected() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings {
            pepper_backend: PepperBackend::File,
            ..Settings::default()
        };

        let store = open_pepper_store(&settings, temp_dir.path());
        assert_eq!(store.backend_name(), "Pepper File");
    }
}
