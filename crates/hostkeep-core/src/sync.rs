//! Cross-device propagation of token metadata
//!
//! Only identity, scope and lifecycle travel between devices. Salts,
//! verifiers and wrapped unlock secrets stay where they were minted; a
//! definition that arrives from elsewhere is a metadata-only stub until it is
//! activated locally with a fresh secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::crypto::SecretBytes;
use crate::error::{Result, VaultError};
use crate::token::{codec, issue_secret, HostGrant, HostId, StoredToken};
use crate::vault::Vault;

/// Host entry of a synced token definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTokenHost {
    pub host_id: HostId,
    pub label: String,
}

/// Secret-free token definition exchanged between devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTokenDef {
    pub token_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: u32,
    #[serde(default = "default_sync_enabled")]
    pub sync_enabled: bool,
    pub hosts: Vec<SyncTokenHost>,
}

fn default_sync_enabled() -> bool {
    true
}

impl SyncTokenDef {
    fn from_record(token: &StoredToken) -> Self {
        Self {
            token_id: token.token_id.clone(),
            name: token.name.clone(),
            created_at: token.created_at,
            updated_at: token.updated_at,
            revoked_at: token.revoked_at,
            deleted_at: token.deleted_at,
            expires_at: token.expires_at,
            max_uses: token.max_uses,
            sync_enabled: token.sync_enabled,
            hosts: token
                .hosts
                .iter()
                .map(|h| SyncTokenHost {
                    host_id: h.host_id,
                    label: h.display_label.clone(),
                })
                .collect(),
        }
    }

    fn problem(&self) -> Option<&'static str> {
        if !codec::is_valid_token_id(&self.token_id) {
            Some("invalid token id")
        } else if self.hosts.is_empty() {
            Some("no hosts")
        } else if self.hosts.iter().any(|h| h.host_id <= 0) {
            Some("invalid host id")
        } else if self.has_duplicate_hosts() {
            Some("duplicate host id")
        } else {
            None
        }
    }

    fn has_duplicate_hosts(&self) -> bool {
        let mut seen = HashSet::new();
        !self.hosts.iter().all(|h| seen.insert(h.host_id))
    }

    fn into_stub(self) -> StoredToken {
        StoredToken {
            token_id: self.token_id,
            name: self.name,
            salt: Vec::new(),
            hash: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: None,
            use_count: 0,
            revoked_at: self.revoked_at,
            deleted_at: self.deleted_at,
            expires_at: self.expires_at,
            max_uses: self.max_uses,
            sync_enabled: true,
            unlock_salt: Vec::new(),
            unlock_data: Vec::new(),
            unlock_bound: false,
            hosts: self
                .hosts
                .into_iter()
                .map(|h| HostGrant::new(h.host_id, h.label))
                .collect(),
        }
    }
}

/// Serialize definitions for the sync transport
pub fn encode_sync_blob(defs: &[SyncTokenDef]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(defs)?)
}

/// Parse definitions received from the sync transport
pub fn decode_sync_blob(blob: &[u8]) -> Result<Vec<SyncTokenDef>> {
    Ok(serde_json::from_slice(blob)?)
}

/// Apply newer remote metadata to a local record, leaving its secrets alone
fn apply_remote(local: &mut StoredToken, remote: SyncTokenDef) {
    local.name = remote.name;
    local.updated_at = remote.updated_at;
    local.expires_at = remote.expires_at;
    local.max_uses = remote.max_uses;
    local.sync_enabled = true;

    // revocation and deletion are one-way
    local.revoked_at = local.revoked_at.or(remote.revoked_at);
    local.deleted_at = local.deleted_at.or(remote.deleted_at);

    let remote_labels: HashMap<HostId, String> = remote
        .hosts
        .iter()
        .map(|h| (h.host_id, h.label.clone()))
        .collect();
    let same_scope = remote_labels.len() == local.hosts.len()
        && local
            .hosts
            .iter()
            .all(|h| remote_labels.contains_key(&h.host_id));
    if !same_scope {
        warn!(
            "Ignoring host scope change for token {} from sync",
            local.token_id
        );
    }
    for grant in &mut local.hosts {
        if let Some(label) = remote_labels.get(&grant.host_id) {
            grant.display_label = label.clone();
        }
    }
}

impl Vault {
    /// Metadata of every sync-enabled token, tombstones included
    pub fn export_sync_definitions(&self) -> Vec<SyncTokenDef> {
        self.tokens()
            .iter()
            .filter(|t| t.sync_enabled)
            .map(SyncTokenDef::from_record)
            .collect()
    }

    /// Merge definitions from another device, last write (by `updated_at`)
    /// wins. Returns whether any record changed.
    pub fn merge_sync_definitions(&mut self, defs: Vec<SyncTokenDef>) -> bool {
        let mut changed = false;

        for remote in defs {
            if let Some(problem) = remote.problem() {
                warn!("Skipping synced token {:?}: {}", remote.token_id, problem);
                continue;
            }

            match self.find_mut(&remote.token_id) {
                None => {
                    debug!("Adding metadata-only token {} from sync", remote.token_id);
                    self.insert_unsorted(remote.into_stub());
                    changed = true;
                }
                Some(local) if local.updated_at >= remote.updated_at => {
                    debug!("Local token {} is up to date", local.token_id);
                }
                Some(local) => {
                    debug!("Updating token {} from sync", local.token_id);
                    apply_remote(local, remote);
                    changed = true;
                }
            }
        }

        if changed {
            self.sort();
            info!("Merged synced token definitions");
        }
        changed
    }

    /// Mint fresh local secret material for a token, typically a stub that
    /// arrived through sync
    ///
    /// Identity, scope and lifecycle are kept. The returned raw token only
    /// works on this device: every activation gets its own secret.
    ///
    /// Revoked and deleted tokens are refused.
    pub fn activate_token(
        &mut self,
        token_id: &str,
        db_unlock_secret: &SecretBytes,
        device_pepper: Option<&SecretBytes>,
    ) -> Result<String> {
        let token = self
            .find_mut(token_id)
            .ok_or_else(|| VaultError::TokenNotFound(token_id.to_string()))?;

        if token.is_deleted() {
            return Err(VaultError::TokenDeleted);
        }
        if token.is_revoked() {
            return Err(VaultError::TokenRevoked);
        }

        let issued = issue_secret(token_id, db_unlock_secret, device_pepper, true)?;

        token.scrub_secrets();
        token.salt = issued.salt;
        token.hash = issued.hash;
        token.unlock_salt = issued.unlock_salt;
        token.unlock_data = issued.unlock_data;
        token.unlock_bound = issued.unlock_bound;

        info!(
            "Activated token {} on this device (device bound: {})",
            token_id, token.unlock_bound
        );
        Ok(issued.raw)
    }
}
