//! OS keychain holder of the device pepper
//!
//! Uses the system keychain:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use base64::{engine::general_purpose::STANDARD, Engine};
use keyring::Entry;
use tracing::{debug, warn};

use super::DeviceSecretStore;
use crate::crypto::SecretBytes;
use crate::error::{Result, VaultError};

/// Service name used for keychain entries
const SERVICE_NAME: &str = "hostkeep";

/// Account name of the device pepper entry
const PEPPER_ACCOUNT: &str = "automation-device-pepper";

/// Device pepper kept in the OS keychain
pub struct KeychainPepperStore {
    account: String,
    available: bool,
}

impl KeychainPepperStore {
    pub fn new() -> Self {
        Self::with_account(PEPPER_ACCOUNT)
    }

    /// Use a custom account name (separate profiles, tests)
    pub fn with_account(account: &str) -> Self {
        let available = Self::test_availability();

        if available {
            debug!("Keychain pepper storage is available");
        } else {
            warn!("Keychain pepper storage is not available");
        }

        Self {
            account: account.to_string(),
            available,
        }
    }

    /// Test if the keychain is available
    fn test_availability() -> bool {
        match Entry::new(SERVICE_NAME, "__test_availability__") {
            Ok(entry) => {
                if entry.set_password("test").is_ok() {
                    let _ = entry.delete_password();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    fn entry(&self) -> Result<Entry> {
        if !self.available {
            return Err(VaultError::Keychain("Keychain not available".to_string()));
        }
        Entry::new(SERVICE_NAME, &self.account).map_err(|e| VaultError::Keychain(e.to_string()))
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

impl Default for KeychainPepperStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSecretStore for KeychainPepperStore {
    fn get(&self) -> Result<Option<SecretBytes>> {
        match self.entry()?.get_password() {
            Ok(encoded) => {
                let decoded = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| VaultError::Keychain(format!("Base64 decode error: {}", e)))?;
                Ok(Some(SecretBytes::new(decoded)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Keychain(e.to_string())),
        }
    }

    fn set(&self, pepper: &SecretBytes) -> Result<()> {
        // keychain stores strings
        self.entry()?
            .set_password(&STANDARD.encode(pepper.expose()))
            .map_err(|e| VaultError::Keychain(e.to_string()))?;

        debug!("Stored device pepper in keychain");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}
