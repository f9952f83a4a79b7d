//! Persistence for the token vault and the device pepper
//!
//! - Vault: JSON file (atomic replace) or in-memory
//! - Device pepper: OS keychain, owner-only file fallback, or in-memory

mod atomic;
mod keychain;
mod pepper;
mod traits;
mod vault_file;

pub use atomic::{write_atomic, write_atomic_blocking};
pub use keychain::KeychainPepperStore;
pub use pepper::{
    load_or_create_device_pepper, open_pepper_store, FilePepperStore, MemoryPepperStore,
    MIN_PEPPER_LEN, PEPPER_FILE_NAME,
};
pub use traits::{DeviceSecretStore, VaultStore};
pub use vault_file::{FileVaultStore, MemoryVaultStore, VAULT_FILE_NAME};
