//! End-to-end token flows through the public API

use hostkeep_core::storage::MemoryPepperStore;
use hostkeep_core::{
    create_token, decode_sync_blob, encode_sync_blob, load_or_create_device_pepper, resolve,
    verify, CreateOptions, ErrorKind, FileVaultStore, HostGrant, SecretBytes, Vault, VaultError,
    VaultStore,
};
use tempfile::TempDir;

fn grants() -> Vec<HostGrant> {
    vec![HostGrant::new(10, "GPU"), HostGrant::new(11, "CPU")]
}

#[test]
fn deploy_token_resolves_to_cpu_host() {
    let (raw, record) =
        create_token("deploy", &grants(), &"master-pw".into(), CreateOptions::default()).unwrap();
    assert!(verify(&raw, &record).is_some());

    let mut vault = Vault::new();
    vault.add_token(&raw, record).unwrap();

    let result = resolve(&vault, &raw, "CPU", None).unwrap();
    assert_eq!(result.host_id, 11);
    assert_eq!(result.db_unlock_secret().unwrap().expose(), b"master-pw");
}

#[test]
fn single_use_token_is_exhausted_after_mark_used() {
    let (raw, record) = create_token(
        "once",
        &grants(),
        &"master-pw".into(),
        CreateOptions {
            max_uses: 1,
            ..Default::default()
        },
    )
    .unwrap();
    let mut vault = Vault::new();
    vault.add_token(&raw, record).unwrap();

    let result = resolve(&vault, &raw, "GPU", None).unwrap();
    vault.mark_used(result.token_index).unwrap();

    let err = resolve(&vault, &raw, "GPU", None).unwrap_err();
    assert!(matches!(err, VaultError::UsageLimitReached));
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
}

#[test]
fn device_bound_token_needs_its_pepper() {
    let pepper_store = MemoryPepperStore::new();
    let pepper = load_or_create_device_pepper(&pepper_store).unwrap();

    let (raw, record) = create_token(
        "bound",
        &grants(),
        &"master-pw".into(),
        CreateOptions {
            device_pepper: Some(pepper.clone()),
            bind_to_device: true,
            ..Default::default()
        },
    )
    .unwrap();
    let mut vault = Vault::new();
    vault.add_token(&raw, record).unwrap();

    let err = resolve(&vault, &raw, "GPU", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceBinding);

    let other_device = SecretBytes::new(vec![0xAB; 32]);
    let err = resolve(&vault, &raw, "GPU", Some(&other_device)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceBinding);

    assert!(resolve(&vault, &raw, "GPU", Some(&pepper)).is_ok());
}

#[test]
fn revoked_token_never_resolves_again() {
    let (raw, record) =
        create_token("deploy", &grants(), &"pw".into(), CreateOptions::default()).unwrap();
    let id = record.token_id.clone();
    let mut vault = Vault::new();
    vault.add_token(&raw, record).unwrap();

    assert!(vault.revoke_token(&id));
    for target in ["GPU", "CPU"] {
        let err = resolve(&vault, &raw, target, None).unwrap_err();
        assert!(matches!(err, VaultError::TokenRevoked));
    }
}

#[tokio::test]
async fn synced_token_travels_between_devices() {
    let laptop_dir = TempDir::new().unwrap();
    let desktop_dir = TempDir::new().unwrap();
    let laptop = FileVaultStore::in_dir(laptop_dir.path());
    let desktop = FileVaultStore::in_dir(desktop_dir.path());

    // minted on the laptop
    let (laptop_raw, record) = create_token(
        "nightly",
        &grants(),
        &"master-pw".into(),
        CreateOptions {
            sync_enabled: true,
            ..Default::default()
        },
    )
    .unwrap();
    let token_id = record.token_id.clone();
    let mut laptop_vault = laptop.load().await.unwrap();
    laptop_vault.add_token(&laptop_raw, record).unwrap();
    laptop.save(&laptop_vault).await.unwrap();

    // transported as an opaque blob
    let blob = encode_sync_blob(&laptop_vault.export_sync_definitions()).unwrap();

    let mut desktop_vault = desktop.load().await.unwrap();
    assert!(desktop_vault.merge_sync_definitions(decode_sync_blob(&blob).unwrap()));
    assert!(resolve(&desktop_vault, &laptop_raw, "GPU", None).is_err());

    let desktop_raw = desktop_vault
        .activate_token(&token_id, &"master-pw".into(), None)
        .unwrap();
    desktop.save(&desktop_vault).await.unwrap();

    let desktop_vault = desktop.load().await.unwrap();
    let result = resolve(&desktop_vault, &desktop_raw, "CPU", None).unwrap();
    assert_eq!(result.host_id, 11);

    // revoke on the laptop, propagate, delete
    laptop_vault.revoke_token(&token_id);
    laptop_vault.delete_revoked_token(&token_id).unwrap();
    let blob = encode_sync_blob(&laptop_vault.export_sync_definitions()).unwrap();

    let mut desktop_vault = desktop_vault;
    assert!(desktop_vault.merge_sync_definitions(decode_sync_blob(&blob).unwrap()));
    assert!(resolve(&desktop_vault, &desktop_raw, "CPU", None).is_err());
    assert!(desktop_vault.list_summaries().is_empty());
}
