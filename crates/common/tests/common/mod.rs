//! Shared test utilities for vault integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::config::VaultConfig;
use common::network::MemoryNetwork;
use common::vault::{Encoding, ManifestUpdate, Vault, VaultOptions};
use tempfile::TempDir;

/// Small blocks so multi-block files are cheap to exercise
pub fn test_config() -> VaultConfig {
    VaultConfig {
        timeout_ms: 2000,
        block_size: 4,
        ..Default::default()
    }
}

/// Set up a new on-disk vault owned by the caller
pub async fn setup_test_env() -> (Vault, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let options = VaultOptions::default()
        .with_storage(temp_dir.path().join("vault"))
        .with_config(test_config());

    let vault = Vault::create(
        options,
        ManifestUpdate {
            title: Some("test".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    (vault, temp_dir)
}

/// An in-memory vault with no manifest and no entries
pub async fn setup_empty_vault() -> Vault {
    let vault = Vault::open(None, VaultOptions::default().with_config(test_config())).unwrap();
    vault.ready().await.unwrap();
    vault
}

/// An owner vault announced on `network` plus a replica of it
pub async fn setup_replicated(network: &MemoryNetwork) -> (Vault, Vault) {
    let network: Arc<MemoryNetwork> = Arc::new(network.clone());
    let owner = Vault::create(
        VaultOptions::default()
            .with_config(test_config())
            .with_network(network.clone()),
        ManifestUpdate::default(),
    )
    .await
    .unwrap();

    let url = owner.url().await.unwrap();
    let replica = Vault::open(
        Some(&url),
        VaultOptions::default()
            .with_config(test_config())
            .with_network(network),
    )
    .unwrap();
    replica.ready().await.unwrap();

    (owner, replica)
}

pub async fn write(vault: &Vault, path: &str, contents: &str) -> u64 {
    vault
        .write_file(path, contents, Encoding::Utf8)
        .await
        .unwrap()
}

pub async fn read(vault: &Vault, path: &str) -> String {
    vault
        .read_file(path, Encoding::Utf8)
        .await
        .unwrap()
        .as_text()
        .unwrap()
        .to_string()
}
