//! Token creation and verification

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;
use zeroize::Zeroize;

use super::codec::{self, ParsedToken};
use super::record::{HostGrant, StoredToken};
use crate::crypto::{
    constant_time, derive_unlock_key, derive_verifier, generate_salt, seal, SecretBytes,
    AAD_DB_UNLOCK_V2,
};
use crate::error::{Result, VaultError};

/// Options for [`create_token`]
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// This machine's pepper; only used when `bind_to_device` is set
    pub device_pepper: Option<SecretBytes>,
    pub bind_to_device: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// 0 means unlimited
    pub max_uses: u32,
    pub sync_enabled: bool,
}

/// Fresh secret material for one token ID
pub(crate) struct IssuedSecret {
    pub raw: String,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    pub unlock_salt: Vec<u8>,
    pub unlock_data: Vec<u8>,
    pub unlock_bound: bool,
}

/// Mint a secret for `token_id`, its verifier, and the unlock secret wrapped
/// under a key derived from it.
pub(crate) fn issue_secret(
    token_id: &str,
    db_unlock_secret: &SecretBytes,
    device_pepper: Option<&SecretBytes>,
    bind_to_device: bool,
) -> Result<IssuedSecret> {
    if db_unlock_secret.is_empty() {
        return Err(VaultError::Validation("unlock secret is empty".to_string()));
    }

    let mut secret = codec::generate_secret();

    let salt = generate_salt();
    let hash = derive_verifier(secret.as_bytes(), &salt)?;

    let pepper = device_pepper
        .map(SecretBytes::expose)
        .filter(|p| bind_to_device && !p.is_empty());
    let unlock_bound = pepper.is_some();

    let unlock_salt = generate_salt();
    let unlock_key = derive_unlock_key(secret.as_bytes(), &unlock_salt, pepper, unlock_bound)?;
    let unlock_data = seal(db_unlock_secret.expose(), &unlock_key, AAD_DB_UNLOCK_V2)?;

    let raw = codec::encode(token_id, &secret);
    secret.zeroize();

    Ok(IssuedSecret {
        raw,
        salt,
        hash,
        unlock_salt,
        unlock_data,
        unlock_bound,
    })
}

fn validate_grants(grants: &[HostGrant]) -> Result<()> {
    if grants.is_empty() {
        return Err(VaultError::Validation(
            "at least one host grant is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for grant in grants {
        if grant.host_id <= 0 {
            return Err(VaultError::Validation(format!(
                "invalid host id {}",
                grant.host_id
            )));
        }
        if !seen.insert(grant.host_id) {
            return Err(VaultError::Validation(format!(
                "host id {} granted twice",
                grant.host_id
            )));
        }
    }
    Ok(())
}

/// Create a new token scoped to `grants`
///
/// Returns the raw token, which is the only copy of the secret, and the
/// record to persist.
pub fn create_token(
    name: &str,
    grants: &[HostGrant],
    db_unlock_secret: &SecretBytes,
    options: CreateOptions,
) -> Result<(String, StoredToken)> {
    validate_grants(grants)?;

    let now = Utc::now();
    if options.expires_at.is_some_and(|expires| expires <= now) {
        return Err(VaultError::Validation(
            "expiry must be in the future".to_string(),
        ));
    }

    let token_id = codec::generate_token_id();
    let issued = issue_secret(
        &token_id,
        db_unlock_secret,
        options.device_pepper.as_ref(),
        options.bind_to_device,
    )?;

    let record = StoredToken {
        token_id: token_id.clone(),
        name: name.trim().to_string(),
        salt: issued.salt,
        hash: issued.hash,
        created_at: now,
        updated_at: now,
        last_used_at: None,
        use_count: 0,
        revoked_at: None,
        deleted_at: None,
        expires_at: options.expires_at,
        max_uses: options.max_uses,
        sync_enabled: options.sync_enabled,
        unlock_salt: issued.unlock_salt,
        unlock_data: issued.unlock_data,
        unlock_bound: issued.unlock_bound,
        hosts: grants
            .iter()
            .map(|g| HostGrant::new(g.host_id, g.display_label.clone()))
            .collect(),
    };

    debug!(
        "Created token {} for {} host(s), device bound: {}",
        token_id,
        record.hosts.len(),
        record.unlock_bound
    );
    Ok((issued.raw, record))
}

/// Check `raw` against `record`, returning the parsed token on success
pub fn verify(raw: &str, record: &StoredToken) -> Option<ParsedToken> {
    let parsed = codec::parse(raw).ok()?;

    if parsed.token_id() != record.token_id || record.salt.is_empty() || record.hash.is_empty()
    {
        return None;
    }

    let candidate = derive_verifier(parsed.secret().as_bytes(), &record.salt).ok()?;
    constant_time::eq(&candidate, &record.hash).then_some(parsed)
}
