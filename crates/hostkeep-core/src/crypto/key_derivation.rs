//! Argon2id derivation of verifiers and wrapping keys from token secrets
//!
//! All derivations share one fixed cost profile. The cost is deliberate:
//! every verification of a raw token pays it.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};

use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Memory cost in KiB (19 MiB)
pub const KDF_MEMORY_KIB: u32 = 19 * 1024;
/// Time cost / iterations
pub const KDF_TIME_COST: u32 = 1;
/// Lanes
pub const KDF_PARALLELISM: u32 = 1;
/// Output length in bytes
pub const KDF_OUTPUT_LEN: usize = 32;
/// Salt length in bytes for freshly generated salts
pub const SALT_LEN: usize = 16;

/// Separates the secret from the device pepper in the KDF input
const PEPPER_SEPARATOR: u8 = 0x00;

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn argon2id(input: &[u8], salt: &[u8]) -> Result<[u8; KDF_OUTPUT_LEN]> {
    let params = Params::new(
        KDF_MEMORY_KIB,
        KDF_TIME_COST,
        KDF_PARALLELISM,
        Some(KDF_OUTPUT_LEN),
    )
    .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; KDF_OUTPUT_LEN];
    argon2
        .hash_password_into(input, salt, &mut out)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Derive the stored verifier for a token secret
pub fn derive_verifier(secret: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    Ok(argon2id(secret, salt)?.to_vec())
}

/// Derive the key that wraps the database-unlock secret
///
/// With `require_pepper` set, a missing or empty pepper is a
/// [`VaultError::DeviceBindingRequired`]. A present pepper is appended to the
/// secret after a separator byte.
pub fn derive_unlock_key(
    secret: &[u8],
    salt: &[u8],
    device_pepper: Option<&[u8]>,
    require_pepper: bool,
) -> Result<DerivedKey> {
    let pepper = device_pepper.filter(|p| !p.is_empty());

    if require_pepper && pepper.is_none() {
        return Err(VaultError::DeviceBindingRequired);
    }

    let mut input = Vec::with_capacity(secret.len() + 1 + pepper.map_or(0, <[u8]>::len));
    input.extend_from_slice(secret);
    if let Some(pepper) = pepper {
        input.push(PEPPER_SEPARATOR);
        input.extend_from_slice(pepper);
    }

    let derived = argon2id(&input, salt);
    zeroize::Zeroize::zeroize(&mut input);

    Ok(DerivedKey::new(derived?))
}

/// Derive the per-host key of a legacy v1 payload
pub fn derive_payload_key(secret: &[u8], payload_salt: &[u8]) -> Result<DerivedKey> {
    Ok(DerivedKey::new(argon2id(secret, payload_salt)?))
}
