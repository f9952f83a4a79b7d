//! # hostkeep-core
//!
//! Automation token vault for hostkeep:
//! - Tokens (`stk_<id>_<secret>`) that let scripts run one command on a named
//!   host without the master password
//! - Argon2id verifiers and AES-256-GCM wrapping of the host database unlock
//!   secret, optionally bound to this device
//! - Revocation, expiry and usage limits
//! - Secret-free metadata sync between devices

pub mod crypto;
pub mod error;
pub mod resolver;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod token;
mod vault;

pub use crypto::SecretBytes;
pub use error::{ErrorKind, Result, VaultError};
pub use resolver::{resolve, resolve_at, ResolveResult, ResolvedSecret};
pub use settings::{PepperBackend, Settings, SettingsManager};
pub use storage::{
    load_or_create_device_pepper, open_pepper_store, DeviceSecretStore, FileVaultStore,
    MemoryVaultStore, VaultStore,
};
pub use sync::{decode_sync_blob, encode_sync_blob, SyncTokenDef, SyncTokenHost};
pub use token::{
    create_token, verify, CreateOptions, HostGrant, HostId, LegacyPayload, StoredToken,
    TokenStatus, TokenSummary,
};
pub use vault::{Vault, VAULT_VERSION};
