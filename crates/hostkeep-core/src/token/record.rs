//! Persisted token record and its lifecycle predicates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ID of a host in the host database
pub type HostId = i64;

/// One host a token may target
///
/// `host_id` is fixed once the token exists; `display_label` follows host
/// renames. `payload`/`payload_salt` are only set on legacy v1 tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGrant {
    pub host_id: HostId,
    #[serde(alias = "label")]
    pub display_label: String,
    #[serde(default, with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
    #[serde(default, with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub payload_salt: Vec<u8>,
}

impl HostGrant {
    pub fn new(host_id: HostId, display_label: impl Into<String>) -> Self {
        Self {
            host_id,
            display_label: display_label.into(),
            payload: Vec::new(),
            payload_salt: Vec::new(),
        }
    }

    /// Whether this grant carries a legacy v1 exec payload
    pub fn has_legacy_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// A token as persisted in the vault file. Holds a verifier of the secret,
/// never the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token_id: String,
    pub name: String,

    /// Argon2id salt and verifier of the token secret
    #[serde(default, with = "b64")]
    pub salt: Vec<u8>,
    #[serde(default, with = "b64")]
    pub hash: Vec<u8>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u64,

    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 0 means unlimited
    #[serde(default)]
    pub max_uses: u32,

    #[serde(default)]
    pub sync_enabled: bool,

    /// Wrapped database-unlock secret (v2 tokens)
    #[serde(default, with = "b64")]
    pub unlock_salt: Vec<u8>,
    #[serde(default, with = "b64")]
    pub unlock_data: Vec<u8>,
    #[serde(default)]
    pub unlock_bound: bool,

    pub hosts: Vec<HostGrant>,
}

/// Where a token stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Active,
    /// Known through sync but not activated on this device
    MetadataOnly,
    Revoked,
    Expired,
    Exhausted,
    Deleted,
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::MetadataOnly => "metadata-only",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Exhausted => "exhausted",
            Self::Deleted => "deleted",
        };
        f.pad(label)
    }
}

impl StoredToken {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.use_count >= u64::from(self.max_uses)
    }

    /// Verifier and wrapped unlock secret are all present
    pub fn has_secret_material(&self) -> bool {
        !self.salt.is_empty() && !self.hash.is_empty() && !self.unlock_data.is_empty()
    }

    /// v1 token resolving to per-host payloads instead of the unlock secret
    pub fn is_legacy(&self) -> bool {
        !self.salt.is_empty()
            && !self.hash.is_empty()
            && self.hosts.iter().any(HostGrant::has_legacy_payload)
    }

    /// No local secret material; needs activation before use
    pub fn is_metadata_only(&self) -> bool {
        !self.has_secret_material() && !self.is_legacy()
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == TokenStatus::Active
    }

    pub fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.is_deleted() {
            TokenStatus::Deleted
        } else if self.is_revoked() {
            TokenStatus::Revoked
        } else if self.is_expired_at(now) {
            TokenStatus::Expired
        } else if self.is_exhausted() {
            TokenStatus::Exhausted
        } else if self.is_metadata_only() {
            TokenStatus::MetadataOnly
        } else {
            TokenStatus::Active
        }
    }

    /// Drop every secret-bearing field, leaving a metadata-only record
    pub(crate) fn scrub_secrets(&mut self) {
        self.salt.clear();
        self.hash.clear();
        self.unlock_salt.clear();
        self.unlock_data.clear();
        self.unlock_bound = false;
        for host in &mut self.hosts {
            host.payload.clear();
            host.payload_salt.clear();
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> TokenSummary {
        TokenSummary {
            token_id: self.token_id.clone(),
            name: self.name.clone(),
            status: self.status(now),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
            use_count: self.use_count,
            max_uses: self.max_uses,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            sync_enabled: self.sync_enabled,
            device_bound: self.unlock_bound,
            legacy: self.is_legacy(),
            hosts: self
                .hosts
                .iter()
                .map(|h| HostSummary {
                    host_id: h.host_id,
                    label: h.display_label.clone(),
                })
                .collect(),
        }
    }
}

/// Host entry of a [`TokenSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub host_id: HostId,
    pub label: String,
}

/// Display-safe view of a token (no salts, verifiers or wrapped data)
#[derive(Debug, Clone, Serialize)]
pub struct TokenSummary {
    pub token_id: String,
    pub name: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub use_count: u64,
    pub max_uses: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub sync_enabled: bool,
    pub device_bound: bool,
    pub legacy: bool,
    pub hosts: Vec<HostSummary>,
}

/// Base64 (standard alphabet) encoding of byte fields in the vault file
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
