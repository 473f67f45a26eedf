//! Integration tests for replicas, activity streams and timeouts

mod common;

use std::sync::Arc;
use std::time::Duration;

use ::common::config::VaultConfig;
use ::common::crypto::SecretKey;
use ::common::log::LogKind;
use ::common::names::StaticNameResolver;
use ::common::network::MemoryNetwork;
use ::common::vault::{
    FileEvent, ManifestUpdate, NetworkEvent, Vault, VaultAddress, VaultError, VaultOptions,
};
use futures::{Stream, StreamExt};
use tempfile::TempDir;

async fn next_within<S: Stream + Unpin>(stream: &mut S) -> S::Item {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("event should arrive")
        .expect("stream should stay open")
}

async fn wait_for_version(vault: &Vault, version: u64) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while vault.version().await.unwrap() < version {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("replica should catch up");
}

#[tokio::test]
async fn test_replica_reads_owner_data() {
    let network = MemoryNetwork::new();
    let (owner, replica) = common::setup_replicated(&network).await;

    common::write(&owner, "/shared.txt", "from the owner").await;
    let version = owner.version().await.unwrap();
    wait_for_version(&replica, version).await;

    assert!(!replica.is_owner().await.unwrap());
    assert_eq!(common::read(&replica, "/shared.txt").await, "from the owner");
    assert_eq!(replica.key().await.unwrap(), owner.key().await.unwrap());
    assert_eq!(replica.get_info().await.unwrap().peers, 1);
}

#[tokio::test]
async fn test_replica_rejects_writes() {
    let network = MemoryNetwork::new();
    let (owner, replica) = common::setup_replicated(&network).await;
    common::write(&owner, "/a.txt", "x").await;

    assert!(matches!(
        replica.write_file("/b.txt", "y", Default::default()).await,
        Err(VaultError::NotWritable)
    ));
    assert!(matches!(replica.mkdir("/d").await, Err(VaultError::NotWritable)));
    assert!(matches!(
        replica.unlink("/a.txt").await,
        Err(VaultError::NotWritable)
    ));
    assert!(matches!(
        replica.rmdir("/d", true).await,
        Err(VaultError::NotWritable)
    ));
    assert!(matches!(
        replica.configure(ManifestUpdate::default()).await,
        Err(VaultError::NotWritable)
    ));
}

#[tokio::test]
async fn test_replica_persists_to_storage_path() {
    let network: Arc<MemoryNetwork> = Arc::new(MemoryNetwork::new());
    let owner = Vault::create(
        VaultOptions::default()
            .with_config(common::test_config())
            .with_network(network.clone()),
        ManifestUpdate {
            title: Some("origin".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    common::write(&owner, "/kept.txt", "stays local").await;
    let key = owner.key().await.unwrap();
    let url = owner.url().await.unwrap();
    let version = owner.version().await.unwrap();

    let temp = TempDir::new().unwrap();
    let root = temp.path().join("copy");
    let replica = Vault::open(
        Some(&url),
        VaultOptions::default()
            .with_storage(&root)
            .with_config(common::test_config())
            .with_network(network),
    )
    .unwrap();
    wait_for_version(&replica, version).await;
    assert!(!replica.is_owner().await.unwrap());
    assert_eq!(common::read(&replica, "/kept.txt").await, "stays local");
    assert!(root.join("key.pub").is_file());
    assert!(!root.join("key.pem").exists());

    replica.close().await.unwrap();
    owner.close().await.unwrap();

    // nobody serves the vault any more; the copy on disk is enough
    let reloaded = Vault::load(VaultOptions::default().with_storage(&root))
        .await
        .unwrap();
    assert_eq!(reloaded.key().await.unwrap(), key);
    assert!(!reloaded.is_owner().await.unwrap());
    assert_eq!(reloaded.version().await.unwrap(), version);
    assert_eq!(common::read(&reloaded, "/kept.txt").await, "stays local");
    assert_eq!(
        reloaded.get_info().await.unwrap().title.as_deref(),
        Some("origin")
    );
    assert!(matches!(
        reloaded.write_file("/new.txt", "x", Default::default()).await,
        Err(VaultError::NotWritable)
    ));
}

#[tokio::test]
async fn test_replica_storage_must_hold_same_vault() {
    let (owner, temp) = common::setup_test_env().await;
    owner.close().await.unwrap();

    let other = SecretKey::generate().unwrap().public();
    let url = VaultAddress::new(other).url();
    let replica = Vault::open(
        Some(&url),
        VaultOptions::default().with_storage(temp.path().join("vault")),
    )
    .unwrap();
    assert!(matches!(
        replica.ready().await,
        Err(VaultError::LoadFailure(_))
    ));
}

#[tokio::test]
async fn test_download_fetches_content() {
    let network = MemoryNetwork::new();
    let (owner, replica) = common::setup_replicated(&network).await;

    // 12 bytes in blocks of 4
    common::write(&owner, "/data/file.bin", "abcdefghijkl").await;
    let version = owner.version().await.unwrap();
    wait_for_version(&replica, version).await;

    let before = replica.stat("/data/file.bin").await.unwrap();
    assert_eq!(before.as_file().unwrap().blocks, 3);
    assert_eq!(before.as_file().unwrap().downloaded, 0);

    let mut activity = replica.network_activity().await.unwrap();
    replica.download("/data").await.unwrap();

    let after = replica.stat("/data/file.bin").await.unwrap();
    assert!(after.as_file().unwrap().is_downloaded());

    let mut blocks = Vec::new();
    while blocks.len() < 3 {
        if let NetworkEvent::Download {
            log: LogKind::Content,
            block,
        } = next_within(&mut activity).await
        {
            blocks.push(block);
        }
    }
    let offset = after.as_file().unwrap().offset;
    assert_eq!(blocks, vec![offset, offset + 1, offset + 2]);

    // owners hold everything already
    owner.download("/").await.unwrap();
    assert!(matches!(
        replica.download("/missing").await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_vault_times_out() {
    let key = SecretKey::generate().unwrap().public();
    let vault = Vault::open(
        Some(&VaultAddress::new(key).to_string()),
        VaultOptions::default().with_config(VaultConfig {
            timeout_ms: 100,
            ..Default::default()
        }),
    )
    .unwrap();

    assert!(matches!(
        vault.read_file("/anything", Default::default()).await,
        Err(VaultError::Timeout(_))
    ));
    assert!(matches!(vault.ready().await, Err(VaultError::Timeout(_))));
    vault.close().await.unwrap();
    assert!(matches!(vault.ready().await, Err(VaultError::Closed)));
}

#[tokio::test]
async fn test_replica_waits_for_first_update() {
    let network = MemoryNetwork::new();
    let secret_dir = tempfile::TempDir::new().unwrap();

    // create the owner on its own network so nothing is announced yet
    let owner = Vault::create(
        VaultOptions::default()
            .with_storage(secret_dir.path().join("v"))
            .with_config(common::test_config()),
        ManifestUpdate::default(),
    )
    .await
    .unwrap();
    let url = owner.url().await.unwrap();
    owner.close().await.unwrap();

    let replica = Vault::open(
        Some(&url),
        VaultOptions::default()
            .with_config(common::test_config())
            .with_network(Arc::new(network.clone())),
    )
    .unwrap();
    assert!(matches!(
        replica.with_timeout(Duration::from_millis(50)).ready().await,
        Err(VaultError::Timeout(_))
    ));

    // the owner comes online on the shared network
    let owner = Vault::load(
        VaultOptions::default()
            .with_storage(secret_dir.path().join("v"))
            .with_network(Arc::new(network.clone())),
    )
    .await
    .unwrap();
    assert!(owner.is_owner().await.unwrap());

    replica.ready().await.unwrap();
    assert_eq!(replica.version().await.unwrap(), 1);
    assert!(replica
        .readdir("/")
        .await
        .unwrap()
        .contains(&"dpack.json".to_string()));
}

#[tokio::test]
async fn test_file_activity() {
    let (vault, _temp) = common::setup_test_env().await;
    let mut all = vault.file_activity(None).await.unwrap();
    let mut docs = vault.file_activity(Some("/docs/**")).await.unwrap();

    let v1 = common::write(&vault, "/a.txt", "x").await;
    let v2 = common::write(&vault, "/docs/b.md", "y").await;
    let v3 = vault.rmdir("/docs", true).await.unwrap();

    assert_eq!(
        next_within(&mut all).await,
        FileEvent::Changed {
            path: "/a.txt".into(),
            version: v1
        }
    );
    assert_eq!(next_within(&mut all).await.path(), "/docs/b.md");
    assert_eq!(
        next_within(&mut all).await,
        FileEvent::Changed {
            path: "/docs".into(),
            version: v3
        }
    );

    assert_eq!(
        next_within(&mut docs).await,
        FileEvent::Changed {
            path: "/docs/b.md".into(),
            version: v2
        }
    );
}

#[tokio::test]
async fn test_replica_file_activity() {
    let network = MemoryNetwork::new();
    let (owner, replica) = common::setup_replicated(&network).await;
    let mut activity = replica.file_activity(Some("*.txt")).await.unwrap();

    common::write(&owner, "/skip.md", "no").await;
    let version = common::write(&owner, "/seen.txt", "yes").await;

    assert_eq!(
        next_within(&mut activity).await,
        FileEvent::Changed {
            path: "/seen.txt".into(),
            version
        }
    );
}

#[tokio::test]
async fn test_network_activity_reports_peers() {
    let network = MemoryNetwork::new();
    let (owner, replica) = common::setup_replicated(&network).await;
    let mut activity = owner.network_activity().await.unwrap();

    replica.close().await.unwrap();
    loop {
        if let NetworkEvent::NetworkChanged { peers: 0 } = next_within(&mut activity).await {
            break;
        }
    }
    assert_eq!(owner.get_info().await.unwrap().peers, 0);
}

#[tokio::test]
async fn test_resolve_name() {
    let key = SecretKey::generate().unwrap().public();
    let names = StaticNameResolver::new();
    names.insert("example.com", key);

    let vault = Vault::open(None, VaultOptions::default().with_names(Arc::new(names))).unwrap();
    assert_eq!(
        vault.resolve_name("dweb://example.com/").await.unwrap(),
        format!("dweb://{}", key.to_hex())
    );
    assert_eq!(
        vault.resolve_name(&key.to_hex()).await.unwrap(),
        format!("dweb://{}", key.to_hex())
    );
    assert!(matches!(
        vault.resolve_name("unknown.com").await,
        Err(VaultError::Name(_))
    ));
}
