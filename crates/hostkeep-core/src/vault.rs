//! The token vault: an ordered set of token records
//!
//! The vault is a plain value. Load it from a [`VaultStore`](crate::storage::VaultStore),
//! mutate it, save it back. Tokens are kept newest first.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{Result, VaultError};
use crate::token::{codec, HostId, StoredToken, TokenSummary};

/// Current vault file format version
pub const VAULT_VERSION: u32 = 2;

/// Collection of automation tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub version: u32,
    #[serde(default)]
    tokens: Vec<StoredToken>,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

impl Vault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self {
            version: VAULT_VERSION,
            tokens: Vec::new(),
        }
    }

    /// All records, tombstones included, newest first
    pub fn tokens(&self) -> &[StoredToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StoredToken> {
        self.tokens.get(index)
    }

    pub fn find(&self, token_id: &str) -> Option<&StoredToken> {
        self.tokens.iter().find(|t| t.token_id == token_id)
    }

    pub fn position(&self, token_id: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t.token_id == token_id)
    }

    pub(crate) fn find_mut(&mut self, token_id: &str) -> Option<&mut StoredToken> {
        self.tokens.iter_mut().find(|t| t.token_id == token_id)
    }

    pub(crate) fn insert_unsorted(&mut self, record: StoredToken) {
        self.tokens.push(record);
    }

    pub(crate) fn sort(&mut self) {
        self.tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Add a freshly created token
    ///
    /// `raw` must belong to `record`; duplicate token IDs are rejected.
    pub fn add_token(&mut self, raw: &str, record: StoredToken) -> Result<()> {
        let parsed = codec::parse(raw)?;
        if parsed.token_id() != record.token_id {
            return Err(VaultError::Validation(
                "raw token does not match record".to_string(),
            ));
        }
        if self.position(&record.token_id).is_some() {
            return Err(VaultError::DuplicateToken(record.token_id));
        }

        info!("Added token {} ({})", record.token_id, record.name);
        self.tokens.push(record);
        self.sort();
        Ok(())
    }

    /// Display-safe summaries of every non-deleted token
    pub fn list_summaries(&self) -> Vec<TokenSummary> {
        let now = Utc::now();
        self.tokens
            .iter()
            .filter(|t| !t.is_deleted())
            .map(|t| t.summary(now))
            .collect()
    }

    /// Revoke a token. Returns false if it is unknown or already deleted.
    ///
    /// Revocation is permanent; revoking twice keeps the first timestamp.
    pub fn revoke_token(&mut self, token_id: &str) -> bool {
        let Some(token) = self.find_mut(token_id) else {
            return false;
        };
        if token.is_deleted() {
            return false;
        }

        if token.revoked_at.is_none() {
            let now = Utc::now();
            token.revoked_at = Some(now);
            token.updated_at = now;
            info!("Revoked token {}", token_id);
        }
        true
    }

    /// Delete a revoked token
    ///
    /// Sync-enabled tokens become tombstones so the deletion reaches other
    /// devices; local-only tokens are removed outright.
    pub fn delete_revoked_token(&mut self, token_id: &str) -> Result<()> {
        let index = self
            .position(token_id)
            .ok_or_else(|| VaultError::TokenNotFound(token_id.to_string()))?;

        let token = &mut self.tokens[index];
        if token.revoked_at.is_none() {
            return Err(VaultError::NotRevoked(token_id.to_string()));
        }
        if token.is_deleted() {
            debug!("Token {} already tombstoned", token_id);
            return Ok(());
        }

        if token.sync_enabled {
            let now = Utc::now();
            token.scrub_secrets();
            token.deleted_at = Some(now);
            token.updated_at = now;
            info!("Tombstoned token {}", token_id);
        } else {
            self.tokens.remove(index);
            info!("Deleted token {}", token_id);
        }
        Ok(())
    }

    /// Record one successful use of the token at `index`
    ///
    /// Call only after the remote command actually ran.
    pub fn mark_used(&mut self, index: usize) -> Result<()> {
        let token = self
            .tokens
            .get_mut(index)
            .ok_or_else(|| VaultError::TokenNotFound(format!("index {index}")))?;

        let now = Utc::now();
        token.use_count += 1;
        token.last_used_at = Some(now);
        token.updated_at = now;

        debug!("Token {} used {} time(s)", token.token_id, token.use_count);
        Ok(())
    }

    /// Refresh display labels after hosts were renamed
    ///
    /// Only labels of already-granted host IDs change; scope never does.
    /// Returns whether anything changed.
    pub fn sync_host_labels(&mut self, labels: &HashMap<HostId, String>) -> bool {
        let now = Utc::now();
        let mut changed = false;

        for token in self.tokens.iter_mut().filter(|t| !t.is_deleted()) {
            let mut token_changed = false;
            for grant in &mut token.hosts {
                if let Some(label) = labels.get(&grant.host_id) {
                    if *label != grant.display_label {
                        grant.display_label = label.clone();
                        token_changed = true;
                    }
                }
            }
            if token_changed {
                token.updated_at = now;
                changed = true;
                debug!("Refreshed host labels of token {}", token.token_id);
            }
        }

        changed
    }
}
