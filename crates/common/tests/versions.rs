//! Integration tests for versions, checkouts and history

mod common;

use std::sync::Arc;

use ::common::network::MemoryNetwork;
use ::common::vault::{
    EntryKind, HistoryOptions, ManifestUpdate, Vault, VaultError, VaultOptions,
};
use futures::StreamExt;

#[tokio::test]
async fn test_each_write_adds_one_version() {
    let (vault, _temp) = common::setup_test_env().await;

    // the manifest is the first entry
    assert_eq!(vault.version().await.unwrap(), 1);
    let mut expected = 1;
    for i in 0..3 {
        let version = common::write(&vault, &format!("/f{}.txt", i), "x").await;
        expected += 1;
        assert_eq!(version, expected);
        assert_eq!(vault.version().await.unwrap(), expected);
    }

    let history = vault.history(HistoryOptions::default()).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].path, "/dpack.json");
    assert_eq!(history[0].version, 1);
    assert_eq!(history[3].path, "/f2.txt");
    assert_eq!(history[3].version, 4);
    assert!(history.iter().all(|entry| entry.kind == EntryKind::PutFile));
}

#[tokio::test]
async fn test_read_previous_version() {
    let (vault, _temp) = common::setup_test_env().await;

    let v1 = common::write(&vault, "/a.txt", "hi").await;
    let v2 = common::write(&vault, "/a.txt", "bye").await;
    assert_eq!(v2, v1 + 1);

    let version = vault.version().await.unwrap();
    assert_eq!(common::read(&vault.checkout(version - 1), "/a.txt").await, "hi");
    assert_eq!(common::read(&vault.checkout(version), "/a.txt").await, "bye");
}

#[tokio::test]
async fn test_snapshots_are_stable() {
    let (vault, _temp) = common::setup_test_env().await;

    common::write(&vault, "/a.txt", "one").await;
    common::write(&vault, "/b.txt", "two").await;
    let pinned = vault.checkout(vault.version().await.unwrap());

    let listing = pinned.readdir("/").await.unwrap();
    let stat = pinned.stat("/a.txt").await.unwrap();

    common::write(&vault, "/a.txt", "changed").await;
    vault.unlink("/b.txt").await.unwrap();
    common::write(&vault, "/c.txt", "three").await;

    assert_eq!(pinned.readdir("/").await.unwrap(), listing);
    assert_eq!(pinned.stat("/a.txt").await.unwrap(), stat);
    assert_eq!(common::read(&pinned, "/a.txt").await, "one");
    assert_eq!(common::read(&pinned, "/b.txt").await, "two");
    assert_eq!(common::read(&vault, "/a.txt").await, "changed");
}

#[tokio::test]
async fn test_version_zero_and_past_tip() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/a.txt", "x").await;

    let empty = vault.checkout(0);
    assert!(empty.readdir("/").await.unwrap().is_empty());
    assert!(matches!(
        empty.stat("/a.txt").await,
        Err(VaultError::NotFound(_))
    ));

    let beyond = vault.checkout(100);
    assert_eq!(beyond.version().await.unwrap(), 2);
    assert_eq!(common::read(&beyond, "/a.txt").await, "x");
}

#[tokio::test]
async fn test_historic_checkouts_are_read_only() {
    let (vault, _temp) = common::setup_test_env().await;
    let historic = vault.checkout(1);

    assert!(matches!(
        historic.write_file("/a.txt", "x", Default::default()).await,
        Err(VaultError::NotWritable)
    ));
    assert!(matches!(
        historic.mkdir("/d").await,
        Err(VaultError::NotWritable)
    ));
    assert!(matches!(
        historic.download("/").await,
        Err(VaultError::Unsupported(_))
    ));
}

#[tokio::test]
async fn test_address_version_suffix() {
    let network = MemoryNetwork::new();
    let owner = Vault::create(
        VaultOptions::default()
            .with_config(common::test_config())
            .with_network(Arc::new(network.clone())),
        ManifestUpdate::default(),
    )
    .await
    .unwrap();
    common::write(&owner, "/a.txt", "a").await;
    common::write(&owner, "/b.txt", "b").await;
    common::write(&owner, "/a.txt", "a2").await;
    assert_eq!(owner.version().await.unwrap(), 4);

    let url = format!("{}+2", owner.url().await.unwrap());
    let pinned = Vault::open(
        Some(&url),
        VaultOptions::default()
            .with_config(common::test_config())
            .with_network(Arc::new(network.clone())),
    )
    .unwrap();

    assert_eq!(pinned.checkout_version(), Some(2));
    assert_eq!(pinned.version().await.unwrap(), 2);
    assert_eq!(pinned.readdir("/").await.unwrap(), vec!["a.txt", "dpack.json"]);
    assert_eq!(common::read(&pinned, "/a.txt").await, "a");

    // later entries do not leak into the pinned view
    common::write(&owner, "/c.txt", "c").await;
    assert_eq!(pinned.version().await.unwrap(), 2);
    assert_eq!(common::read(&pinned, "/a.txt").await, "a");
}

#[tokio::test]
async fn test_reverse_history() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/a", "1").await;
    vault.mkdir("/d").await.unwrap();
    vault.unlink("/a").await.unwrap();

    let forward = vault.history(HistoryOptions::default()).await.unwrap();
    let mut reverse = vault
        .history(HistoryOptions {
            reverse: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(reverse.len(), forward.len());
    assert_eq!(reverse[0].kind, EntryKind::Delete);
    reverse.reverse();
    assert_eq!(reverse, forward);

    let kinds: Vec<EntryKind> = forward.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::PutFile,
            EntryKind::PutFile,
            EntryKind::PutDirectory,
            EntryKind::Delete
        ]
    );
}

#[tokio::test]
async fn test_history_ranges() {
    let (vault, _temp) = common::setup_test_env().await;
    for i in 0..4 {
        common::write(&vault, &format!("/{}", i), "x").await;
    }

    let window = vault
        .history(HistoryOptions {
            start: Some(1),
            end: Some(3),
            reverse: false,
        })
        .await
        .unwrap();
    let versions: Vec<u64> = window.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![2, 3]);

    let newest_two = vault
        .history(HistoryOptions {
            start: None,
            end: Some(2),
            reverse: true,
        })
        .await
        .unwrap();
    let versions: Vec<u64> = newest_two.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![5, 4]);

    // a historic checkout only reports its own entries
    let historic = vault.checkout(2).history(HistoryOptions::default()).await.unwrap();
    assert_eq!(historic.len(), 2);
}

#[tokio::test]
async fn test_history_stream_is_lazy_and_independent() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/a", "1").await;

    let mut first = vault.history_stream(HistoryOptions::default()).await.unwrap();
    let mut second = vault.history_stream(HistoryOptions::default()).await.unwrap();

    let a = first.next().await.unwrap().unwrap();
    let b = second.next().await.unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(first.next().await.unwrap().unwrap().path, "/a");
    assert!(first.next().await.is_none());
}

#[tokio::test]
async fn test_diff_commit_revert_are_empty() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/a", "1").await;

    assert!(vault.diff().await.unwrap().is_empty());
    assert!(vault.commit().await.unwrap().is_empty());
    assert!(vault.revert().await.unwrap().is_empty());
    assert_eq!(common::read(&vault, "/a").await, "1");
}
