//! Error types for hostkeep-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Coarse error category, for callers that branch on the kind of failure
/// rather than on a specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape: empty grants, malformed token string, ...
    Validation,
    /// Key derivation / AEAD failure
    Crypto,
    /// Token is revoked, deleted, expired or used up
    Lifecycle,
    /// Target label does not select exactly one grant
    Scope,
    /// Token is bound to a device pepper that is not available
    DeviceBinding,
    /// Disk, keychain or (de)serialization failure
    Persistence,
    /// No token with the requested ID
    NotFound,
}

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid token format: expected stk_<id>_<secret>")]
    InvalidTokenFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Token already exists: {0}")]
    DuplicateToken(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Token must be revoked before it can be deleted: {0}")]
    NotRevoked(String),

    #[error("Token deleted")]
    TokenDeleted,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token usage limit reached")]
    UsageLimitReached,

    #[error("Target not allowed for this token: {0}")]
    TargetNotAllowed(String),

    #[error("Target is ambiguous for this token: {0}")]
    TargetAmbiguous(String),

    #[error("Token is bound to another device - run it on the original device or re-activate it here")]
    DeviceBindingRequired,

    #[error("Unlock failed")]
    UnlockFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTokenFormat
            | Self::Validation(_)
            | Self::DuplicateToken(_)
            | Self::NotRevoked(_) => ErrorKind::Validation,
            Self::InvalidToken
            | Self::UnlockFailed
            | Self::KeyDerivation(_)
            | Self::Encryption(_) => ErrorKind::Crypto,
            Self::TokenDeleted
            | Self::TokenRevoked
            | Self::TokenExpired
            | Self::UsageLimitReached => ErrorKind::Lifecycle,
            Self::TargetNotAllowed(_) | Self::TargetAmbiguous(_) => ErrorKind::Scope,
            Self::DeviceBindingRequired => ErrorKind::DeviceBinding,
            Self::Keychain(_)
            | Self::StorageError(_)
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorKind::Persistence,
            Self::TokenNotFound(_) => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_share_kind() {
        for err in [
            VaultError::TokenDeleted,
            VaultError::TokenRevoked,
            VaultError::TokenExpired,
            VaultError::UsageLimitReached,
        ] {
            assert_eq!(err.kind(), ErrorKind::Lifecycle);
        }
    }

    #[test]
    fn test_device_binding_distinct_from_crypto() {
        assert_eq!(VaultError::DeviceBindingRequired.kind(), ErrorKind::DeviceBinding);
        assert_eq!(VaultError::UnlockFailed.kind(), ErrorKind::Crypto);
        assert_ne!(
            VaultError::DeviceBindingRequired.to_string(),
            VaultError::UnlockFailed.to_string()
        );
    }

    #[test]
    fn test_io_error_is_persistence() {
        let err: VaultError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
