//! AES-256-GCM authenticated encryption with purpose-bound associated data
//!
//! Wire format: `nonce (12 bytes) || ciphertext || auth tag (16 bytes)`.
//! Every seal names its purpose through the associated data, so a blob
//! sealed as a legacy payload will not open as a wrapped unlock secret.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Associated data for legacy per-host exec payloads
pub const AAD_PAYLOAD_V1: &[u8] = b"hostkeep.automation.payload.v1";
/// Associated data for the wrapped database-unlock secret
pub const AAD_DB_UNLOCK_V2: &[u8] = b"hostkeep.automation.dbunlock.v2";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Sealed data split into nonce and ciphertext (auth tag appended)
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Parse from `nonce || ciphertext || tag`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Encryption("sealed data too short".to_string()));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Encrypt plaintext under `key`, binding it to `aad`
pub fn seal(plaintext: &[u8], key: &DerivedKey, aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    Ok(EncryptedData { nonce, ciphertext }.to_bytes())
}

/// Decrypt data produced by [`seal`] with the same key and associated data
pub fn open(sealed: &[u8], key: &DerivedKey, aad: &[u8]) -> Result<Vec<u8>> {
    let encrypted = EncryptedData::from_bytes(sealed)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            Payload {
                msg: encrypted.ciphertext.as_slice(),
                aad,
            },
        )
        .map_err(|e| VaultError::Encryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(byte: u8) -> DerivedKey {
        DerivedKey::new([byte; 32])
    }

    #[test]
    fn test_seal_open() {
        let key = test_key(1);
        let sealed = seal(b"master-pw", &key, AAD_DB_UNLOCK_V2).unwrap();

        assert_eq!(sealed.len(), NONCE_LEN + 9 + TAG_LEN);
        assert_eq!(open(&sealed, &key, AAD_DB_UNLOCK_V2).unwrap(), b"master-pw");
    }

    #[test]
    fn test_random_nonces() {
        let key = test_key(1);
        let a = seal(b"same plaintext", &key, AAD_DB_UNLOCK_V2).unwrap();
        let b = seal(b"same plaintext", &key, AAD_DB_UNLOCK_V2).unwrap();

        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_purpose_mismatch_fails() {
        let key = test_key(1);
        let sealed = seal(b"payload", &key, AAD_PAYLOAD_V1).unwrap();

        assert!(open(&sealed, &key, AAD_DB_UNLOCK_V2).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(b"secret data", &test_key(1), AAD_DB_UNLOCK_V2).unwrap();
        assert!(open(&sealed, &test_key(2), AAD_DB_UNLOCK_V2).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key(1);
        let mut sealed = seal(b"secret data", &key, AAD_DB_UNLOCK_V2).unwrap();
        sealed[NONCE_LEN] ^= 0xFF;

        assert!(open(&sealed, &key, AAD_DB_UNLOCK_V2).is_err());
    }

    #[test]
    fn test_truncated_input_fails() {
        let key = test_key(1);
        assert!(open(&[0u8; 10], &key, AAD_DB_UNLOCK_V2).is_err());
    }
}
