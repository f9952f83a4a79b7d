//! Legacy v1 exec payloads
//!
//! v1 tokens carried one sealed connection payload per host, keyed by the bare
//! token secret. They still resolve so already-issued tokens keep working;
//! nothing mints them anymore.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::record::{HostGrant, HostId};
use crate::crypto::{derive_payload_key, open, AAD_PAYLOAD_V1};
use crate::error::{Result, VaultError};

/// Connection details sealed inside a v1 grant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LegacyPayload {
    pub host_id: HostId,
    #[serde(default)]
    pub label: String,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl std::fmt::Debug for LegacyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyPayload")
            .field("host_id", &self.host_id)
            .field("label", &self.label)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Open the payload of `grant` with the token secret
///
/// The embedded host ID must match the grant it was stored under. Every
/// failure is reported as [`VaultError::UnlockFailed`].
pub(crate) fn open_payload(secret: &[u8], grant: &HostGrant) -> Result<LegacyPayload> {
    if grant.payload_salt.is_empty() {
        return Err(VaultError::UnlockFailed);
    }

    let key =
        derive_payload_key(secret, &grant.payload_salt).map_err(|_| VaultError::UnlockFailed)?;
    let mut plaintext =
        open(&grant.payload, &key, AAD_PAYLOAD_V1).map_err(|_| VaultError::UnlockFailed)?;

    let parsed = serde_json::from_slice::<LegacyPayload>(&plaintext);
    plaintext.zeroize();
    let payload = parsed.map_err(|_| VaultError::UnlockFailed)?;

    if payload.host_id != grant.host_id {
        return Err(VaultError::UnlockFailed);
    }
    Ok(payload)
}

/// Seal a v1 payload the way old clients did (fixtures for migration tests)
#[cfg(test)]
pub(crate) fn seal_payload(secret: &[u8], payload: &LegacyPayload) -> (Vec<u8>, Vec<u8>) {
    use crate::crypto::{generate_salt, seal};

    let salt = generate_salt();
    let key = derive_payload_key(secret, &salt).unwrap();
    let plaintext = serde_json::to_vec(payload).unwrap();
    (seal(&plaintext, &key, AAD_PAYLOAD_V1).unwrap(), salt)
}
