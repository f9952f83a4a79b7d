//! Automation tokens: raw token codec, persisted records, minting

pub mod codec;
mod legacy;
mod mint;
mod record;

pub use codec::{ParsedToken, TOKEN_PREFIX};
pub use legacy::LegacyPayload;
pub(crate) use legacy::open_payload;
pub(crate) use mint::issue_secret;
pub use mint::{create_token, verify, CreateOptions};
pub use record::{HostGrant, HostId, HostSummary, StoredToken, TokenStatus, TokenSummary};

#[cfg(test)]
pub(crate) use legacy::{seal_payload, tests::payload_for};
#[cfg(test)]
pub(crate) use record::tests::sample_token;
