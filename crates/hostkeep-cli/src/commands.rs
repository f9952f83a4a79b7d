//! Command implementations
//!
//! Every mutating command loads the vault, applies one change and saves it
//! back atomically. Raw tokens are printed to stdout exactly once, at
//! creation or activation; nothing else ever prints secret material.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use hostkeep_core::settings::default_data_dir;
use hostkeep_core::token::codec;
use hostkeep_core::{
    create_token, decode_sync_blob, encode_sync_blob, load_or_create_device_pepper,
    open_pepper_store, resolve, CreateOptions, FileVaultStore, HostGrant, ResolvedSecret, Result,
    SecretBytes, SettingsManager, TokenSummary, Vault, VaultError, VaultStore,
};

use crate::cli::{Command, SyncCommand};

/// Data directory, settings and vault location for one invocation
pub struct Context {
    settings: SettingsManager,
    store: FileVaultStore,
}

impl Context {
    /// Open the context rooted at `data_dir`, or the default data directory
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)?;

        let settings = SettingsManager::new(&data_dir)?;
        let store = FileVaultStore::new(settings.vault_path());
        debug!("Using vault at {:?}", store.path());

        Ok(Self { settings, store })
    }

    pub fn data_dir(&self) -> &Path {
        self.settings.data_dir()
    }

    pub fn store(&self) -> &FileVaultStore {
        &self.store
    }

    /// Whether a create/activate should bind, given its flags and settings
    fn should_bind(&self, bind_device: bool, portable: bool) -> bool {
        if portable {
            return false;
        }
        bind_device || self.settings.get().bind_to_device_by_default
    }

    fn device_pepper(&self) -> Result<SecretBytes> {
        let pepper_store = open_pepper_store(self.settings.get(), self.data_dir());
        load_or_create_device_pepper(pepper_store.as_ref())
    }
}

/// Execute one command
pub async fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Create {
            name,
            hosts,
            bind_device,
            portable,
            expires_in_hours,
            max_uses,
            sync,
            unlock_secret,
        } => {
            let bind = ctx.should_bind(bind_device, portable);
            let options = CreateOptions {
                device_pepper: if bind { Some(ctx.device_pepper()?) } else { None },
                bind_to_device: bind,
                expires_at: expires_in_hours.map(expiry_from_now).transpose()?,
                max_uses: max_uses.unwrap_or(ctx.settings.get().default_max_uses),
                sync_enabled: sync,
            };
            let raw = create(ctx, &name, &hosts, unlock_secret, options).await?;
            println!("{}", raw);
            eprintln!("Store this token now; it cannot be shown again.");
        }
        Command::List { json } => {
            let vault = ctx.store.load().await?;
            let summaries = vault.list_summaries();
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No tokens");
            } else {
                for summary in &summaries {
                    println!("{}", format_summary(summary));
                }
            }
        }
        Command::Revoke { token_id } => {
            revoke(ctx, &token_id).await?;
            println!("Revoked {}", token_id);
        }
        Command::Delete { token_id } => {
            delete(ctx, &token_id).await?;
            println!("Deleted {}", token_id);
        }
        Command::Check { token, target } => {
            println!("{}", check(ctx, &token, &target).await?);
        }
        Command::Activate {
            token_id,
            bind_device,
            portable,
            unlock_secret,
        } => {
            let pepper = if ctx.should_bind(bind_device, portable) {
                Some(ctx.device_pepper()?)
            } else {
                None
            };
            let raw = activate(ctx, &token_id, unlock_secret, pepper).await?;
            println!("{}", raw);
            eprintln!("Store this token now; it cannot be shown again.");
        }
        Command::Relabel { hosts } => {
            if relabel(ctx, &hosts).await? {
                println!("Updated host labels");
            } else {
                println!("Host labels already current");
            }
        }
        Command::Sync(SyncCommand::Export { out }) => {
            let blob = export(ctx).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &blob).await?;
                    eprintln!("Wrote sync definitions to {}", path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&blob)),
            }
        }
        Command::Sync(SyncCommand::Import { file }) => {
            let blob = tokio::fs::read(&file).await?;
            if import(ctx, &blob).await? {
                println!("Vault updated from {}", file.display());
            } else {
                println!("Nothing to merge");
            }
        }
    }

    Ok(())
}

/// Expiry `hours` from now; out-of-range values are a validation error
fn expiry_from_now(hours: u32) -> Result<DateTime<Utc>> {
    Utc::now()
        .checked_add_signed(Duration::hours(hours.into()))
        .ok_or_else(|| VaultError::Validation("expiry too far in the future".to_string()))
}

fn unlock_secret_or_prompt(value: Option<String>) -> Result<SecretBytes> {
    let value = match value {
        Some(value) => value,
        None => rpassword::prompt_password("Host database unlock secret: ")?,
    };
    Ok(SecretBytes::new(value.into_bytes()))
}

/// Mint a token and store it; returns the raw token
pub async fn create(
    ctx: &Context,
    name: &str,
    hosts: &[HostGrant],
    unlock_secret: Option<String>,
    options: CreateOptions,
) -> Result<String> {
    let mut vault = ctx.store.load().await?;
    let secret = unlock_secret_or_prompt(unlock_secret)?;

    let (raw, record) = create_token(name, hosts, &secret, options)?;
    vault.add_token(&raw, record)?;
    ctx.store.save(&vault).await?;

    Ok(raw)
}

pub async fn revoke(ctx: &Context, token_id: &str) -> Result<()> {
    let mut vault = ctx.store.load().await?;
    if !vault.revoke_token(token_id) {
        return Err(VaultError::TokenNotFound(token_id.to_string()));
    }
    ctx.store.save(&vault).await
}

pub async fn delete(ctx: &Context, token_id: &str) -> Result<()> {
    let mut vault = ctx.store.load().await?;
    vault.delete_revoked_token(token_id)?;
    ctx.store.save(&vault).await
}

/// Resolve without recording a use; the report never includes the secret
pub async fn check(ctx: &Context, raw: &str, target: &str) -> Result<String> {
    let vault = ctx.store.load().await?;

    // only touch the pepper store for device-bound tokens
    let pepper = if needs_pepper(&vault, raw) {
        let pepper_store = open_pepper_store(ctx.settings.get(), ctx.data_dir());
        pepper_store.get()?
    } else {
        None
    };

    let result = resolve(&vault, raw, target, pepper.as_ref())?;
    let kind = match &result.secret {
        ResolvedSecret::DbUnlock(_) => "database unlock",
        ResolvedSecret::Legacy(_) => "legacy exec payload",
    };
    info!("Token {} resolved to host {}", result.token_id, result.host_id);

    Ok(format!(
        "{} -> host {} ({}) via {}",
        result.token_id, result.host_id, result.host_label, kind
    ))
}

fn needs_pepper(vault: &Vault, raw: &str) -> bool {
    codec::parse(raw)
        .ok()
        .and_then(|parsed| vault.find(parsed.token_id()).map(|t| t.unlock_bound))
        .unwrap_or(false)
}

pub async fn activate(
    ctx: &Context,
    token_id: &str,
    unlock_secret: Option<String>,
    pepper: Option<SecretBytes>,
) -> Result<String> {
    let mut vault = ctx.store.load().await?;
    if vault.find(token_id).is_none() {
        return Err(VaultError::TokenNotFound(token_id.to_string()));
    }
    let secret = unlock_secret_or_prompt(unlock_secret)?;

    let raw = vault.activate_token(token_id, &secret, pepper.as_ref())?;
    ctx.store.save(&vault).await?;
    Ok(raw)
}

/// Apply current host labels; returns whether anything changed
pub async fn relabel(ctx: &Context, hosts: &[HostGrant]) -> Result<bool> {
    let labels: HashMap<_, _> = hosts
        .iter()
        .map(|grant| (grant.host_id, grant.display_label.clone()))
        .collect();

    let mut vault = ctx.store.load().await?;
    let changed = vault.sync_host_labels(&labels);
    if changed {
        ctx.store.save(&vault).await?;
    }
    Ok(changed)
}

pub async fn export(ctx: &Context) -> Result<Vec<u8>> {
    let vault = ctx.store.load().await?;
    encode_sync_blob(&vault.export_sync_definitions())
}

/// Merge an exported blob; returns whether the vault changed
pub async fn import(ctx: &Context, blob: &[u8]) -> Result<bool> {
    let defs = decode_sync_blob(blob)?;
    let mut vault = ctx.store.load().await?;
    let changed = vault.merge_sync_definitions(defs);
    if changed {
        ctx.store.save(&vault).await?;
    }
    Ok(changed)
}

fn format_summary(summary: &TokenSummary) -> String {
    let hosts = summary
        .hosts
        .iter()
        .map(|h| format!("{}={}", h.host_id, h.label))
        .collect::<Vec<_>>()
        .join(",");

    let uses = if summary.max_uses == 0 {
        summary.use_count.to_string()
    } else {
        format!("{}/{}", summary.use_count, summary.max_uses)
    };

    let mut line = format!(
        "{}  {:<20} {:<13} uses {:<7} hosts {}",
        summary.token_id, summary.name, summary.status, uses, hosts
    );
    if let Some(expires_at) = summary.expires_at {
        line.push_str(&format!("  expires {}", expires_at.format("%Y-%m-%d %H:%M")));
    }
    if summary.device_bound {
        line.push_str("  [device]");
    }
    if summary.sync_enabled {
        line.push_str("  [sync]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostkeep_core::{ErrorKind, TokenStatus};
    use tempfile::TempDir;

    fn grants() -> Vec<HostGrant> {
        vec![HostGrant::new(10, "GPU"), HostGrant::new(11, "CPU")]
    }

    fn sync_options() -> CreateOptions {
        CreateOptions {
            sync_enabled: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_check_revoke_delete() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::open(Some(temp_dir.path().to_path_buf())).unwrap();

        let raw = create(
            &ctx,
            "deploy",
            &grants(),
            Some("master-pw".to_string()),
            CreateOptions::default(),
        )
        .await
        .unwrap();
        let token_id = codec::parse(&raw).unwrap().token_id().to_string();

        let report = check(&ctx, &raw, "CPU").await.unwrap();
        assert!(report.contains("host 11 (CPU)"));
        assert!(!report.contains("master-pw"));

        let err = check(&ctx, &raw, "TPU").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scope);

        // check is a dry run
        let vault = ctx.store().load().await.unwrap();
        assert_eq!(vault.find(&token_id).unwrap().use_count, 0);

        assert!(matches!(
            delete(&ctx, &token_id).await,
            Err(VaultError::NotRevoked(_))
        ));
        revoke(&ctx, &token_id).await.unwrap();
        assert!(matches!(
            check(&ctx, &raw, "CPU").await,
            Err(VaultError::TokenRevoked)
        ));

        delete(&ctx, &token_id).await.unwrap();
        let vault = ctx.store().load().await.unwrap();
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_unrepresentable_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::open(Some(temp_dir.path().to_path_buf())).unwrap();

        let err = run(
            &ctx,
            Command::Create {
                name: "far".to_string(),
                hosts: grants(),
                bind_device: false,
                portable: true,
                expires_in_hours: Some(u32::MAX),
                max_uses: None,
                sync: false,
                unlock_secret: Some("pw".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let vault = ctx.store().load().await.unwrap();
        assert!(vault.is_empty());
    }

    #[test]
    fn test_expiry_from_now() {
        let expires = expiry_from_now(2).unwrap();
        assert!(expires > Utc::now() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::open(Some(temp_dir.path().to_path_buf())).unwrap();

        let err = revoke(&ctx, "aaaaaaaaaaaaaaaa").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_relabel_persists() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::open(Some(temp_dir.path().to_path_buf())).unwrap();
        let raw = create(
            &ctx,
            "deploy",
            &grants(),
            Some("pw".to_string()),
            CreateOptions::default(),
        )
        .await
        .unwrap();

        assert!(relabel(&ctx, &[HostGrant::new(10, "GPU-2")]).await.unwrap());
        assert!(!relabel(&ctx, &[HostGrant::new(10, "GPU-2")]).await.unwrap());

        assert!(check(&ctx, &raw, "GPU-2").await.is_ok());
        assert!(check(&ctx, &raw, "GPU").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_between_data_dirs() {
        let laptop_dir = TempDir::new().unwrap();
        let desktop_dir = TempDir::new().unwrap();
        let laptop = Context::open(Some(laptop_dir.path().to_path_buf())).unwrap();
        let desktop = Context::open(Some(desktop_dir.path().to_path_buf())).unwrap();

        let raw = create(
            &laptop,
            "nightly",
            &grants(),
            Some("pw".to_string()),
            sync_options(),
        )
        .await
        .unwrap();
        let token_id = codec::parse(&raw).unwrap().token_id().to_string();

        let blob = export(&laptop).await.unwrap();
        assert!(import(&desktop, &blob).await.unwrap());
        assert!(!import(&desktop, &blob).await.unwrap());

        let vault = desktop.store().load().await.unwrap();
        let summaries = vault.list_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, TokenStatus::MetadataOnly);

        let desktop_raw = activate(&desktop, &token_id, Some("pw".to_string()), None)
            .await
            .unwrap();
        assert_ne!(desktop_raw, raw);
        assert!(check(&desktop, &desktop_raw, "GPU").await.is_ok());
        assert!(check(&desktop, &raw, "GPU").await.is_err());
    }

    #[tokio::test]
    async fn test_activate_unknown_token() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::open(Some(temp_dir.path().to_path_buf())).unwrap();

        let err = activate(&ctx, "aaaaaaaaaaaaaaaa", Some("pw".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::TokenNotFound(_)));
    }

    #[test]
    fn test_summary_line_has_no_secrets() {
        let (_, record) = create_token(
            "deploy",
            &grants(),
            &"master-pw".into(),
            CreateOptions {
                max_uses: 3,
                ..Default::default()
            },
        )
        .unwrap();

        let line = format_summary(&record.summary(Utc::now()));
        assert!(line.contains("0/3"));
        assert!(line.contains("10=GPU,11=CPU"));
        assert!(!line.contains("master-pw"));
    }
}
