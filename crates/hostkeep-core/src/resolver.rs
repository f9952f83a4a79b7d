//! Resolution of a raw token against a target host label
//!
//! Each check has its own error and the first failing check wins. Nothing
//! is retried: the outcome is an authorization decision.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::crypto::{derive_unlock_key, open, SecretBytes, AAD_DB_UNLOCK_V2};
use crate::error::{Result, VaultError};
use crate::token::{codec, open_payload, verify, HostId, LegacyPayload};
use crate::vault::Vault;

/// What a resolved token unlocks
#[derive(Debug)]
pub enum ResolvedSecret {
    /// v2: the secret that unlocks the host database
    DbUnlock(SecretBytes),
    /// v1: a self-contained connection payload for the target host
    Legacy(LegacyPayload),
}

/// Outcome of a successful [`resolve`]
#[derive(Debug)]
pub struct ResolveResult {
    /// Position of the token in the vault, for [`Vault::mark_used`]
    pub token_index: usize,
    pub token_id: String,
    pub host_id: HostId,
    pub host_label: String,
    pub secret: ResolvedSecret,
}

impl ResolveResult {
    pub fn db_unlock_secret(&self) -> Option<&SecretBytes> {
        match &self.secret {
            ResolvedSecret::DbUnlock(secret) => Some(secret),
            ResolvedSecret::Legacy(_) => None,
        }
    }

    pub fn legacy_payload(&self) -> Option<&LegacyPayload> {
        match &self.secret {
            ResolvedSecret::Legacy(payload) => Some(payload),
            ResolvedSecret::DbUnlock(_) => None,
        }
    }
}

/// Resolve `raw` for `target_label` at the current time
pub fn resolve(
    vault: &Vault,
    raw: &str,
    target_label: &str,
    device_pepper: Option<&SecretBytes>,
) -> Result<ResolveResult> {
    resolve_at(vault, raw, target_label, device_pepper, Utc::now())
}

/// Resolve `raw` for `target_label` as of `now`
pub fn resolve_at(
    vault: &Vault,
    raw: &str,
    target_label: &str,
    device_pepper: Option<&SecretBytes>,
    now: DateTime<Utc>,
) -> Result<ResolveResult> {
    let parsed = codec::parse(raw).map_err(|_| VaultError::InvalidToken)?;
    let token_index = vault
        .position(parsed.token_id())
        .ok_or(VaultError::InvalidToken)?;
    let token = &vault.tokens()[token_index];

    let verified = verify(raw, token).ok_or(VaultError::InvalidToken)?;

    if token.is_deleted() {
        return Err(VaultError::TokenDeleted);
    }
    if token.is_revoked() {
        return Err(VaultError::TokenRevoked);
    }
    if token.is_expired_at(now) {
        return Err(VaultError::TokenExpired);
    }
    if token.is_exhausted() {
        return Err(VaultError::UsageLimitReached);
    }

    let mut matches = token
        .hosts
        .iter()
        .filter(|h| h.display_label == target_label);
    let grant = match (matches.next(), matches.next()) {
        (None, _) => return Err(VaultError::TargetNotAllowed(target_label.to_string())),
        (Some(_), Some(_)) => {
            warn!(
                "Token {} grants several hosts labelled {:?}",
                token.token_id, target_label
            );
            return Err(VaultError::TargetAmbiguous(target_label.to_string()));
        }
        (Some(grant), None) => grant,
    };

    let secret = verified.secret().as_bytes();

    let resolved = if grant.has_legacy_payload() {
        ResolvedSecret::Legacy(open_payload(secret, grant)?)
    } else {
        let pepper = device_pepper.map(SecretBytes::expose).filter(|_| token.unlock_bound);
        let key = derive_unlock_key(secret, &token.unlock_salt, pepper, token.unlock_bound)
            .map_err(|e| match e {
                VaultError::DeviceBindingRequired => e,
                _ => VaultError::UnlockFailed,
            })?;

        let plaintext = open(&token.unlock_data, &key, AAD_DB_UNLOCK_V2).map_err(|_| {
            if token.unlock_bound {
                VaultError::DeviceBindingRequired
            } else {
                VaultError::UnlockFailed
            }
        })?;
        ResolvedSecret::DbUnlock(SecretBytes::new(plaintext))
    };

    debug!("Resolved token {} to host {}", token.token_id, grant.host_id);
    Ok(ResolveResult {
        token_index,
        token_id: token.token_id.clone(),
        host_id: grant.host_id,
        host_label: grant.display_label.clone(),
        secret: resolved,
    })
}
