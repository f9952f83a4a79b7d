//! Cryptographic primitives for automation tokens
//!
//! This module provides:
//! - Argon2id derivation of verifiers and wrapping keys
//! - AES-256-GCM authenticated encryption with purpose-bound associated data
//! - Constant-time comparison and zeroize-on-drop secret holders

pub mod constant_time;
mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{open, seal, EncryptedData, AAD_DB_UNLOCK_V2, AAD_PAYLOAD_V1};
pub use key_derivation::{
    derive_payload_key, derive_unlock_key, derive_verifier, generate_salt, KDF_OUTPUT_LEN,
    SALT_LEN,
};
pub use secure_memory::{DerivedKey, SecretBytes};
