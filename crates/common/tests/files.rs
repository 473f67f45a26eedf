//! Integration tests for reading and writing files

mod common;

use ::common::vault::{Contents, Encoding, Stat, VaultError};
use bytes::Bytes;

#[tokio::test]
async fn test_write_then_read() {
    let (vault, _temp) = common::setup_test_env().await;

    common::write(&vault, "/hello.txt", "hello world").await;
    assert_eq!(common::read(&vault, "/hello.txt").await, "hello world");

    // leading slash is optional
    assert_eq!(common::read(&vault, "hello.txt").await, "hello world");
}

#[tokio::test]
async fn test_overwrite_keeps_latest() {
    let (vault, _temp) = common::setup_test_env().await;

    common::write(&vault, "/a.txt", "first").await;
    common::write(&vault, "/a.txt", "second version").await;
    assert_eq!(common::read(&vault, "/a.txt").await, "second version");
    assert_eq!(vault.readdir("/").await.unwrap(), vec!["a.txt", "dpack.json"]);
}

#[tokio::test]
async fn test_encodings_round_trip() {
    let (vault, _temp) = common::setup_test_env().await;
    let bytes = Bytes::from_static(&[0x00, 0x10, 0x7f, 0x80, 0xfe, 0xff, 0x42]);

    for encoding in [Encoding::Hex, Encoding::Base64, Encoding::Binary] {
        let path = format!("/blob.{}", encoding);
        let encoded = encoding.encode(bytes.clone());
        vault.write_file(&path, encoded, encoding).await.unwrap();

        let read = vault.read_file(&path, encoding).await.unwrap();
        assert_eq!(encoding.decode(read).unwrap(), bytes, "{}", encoding);
        let raw = vault.read_file(&path, Encoding::Binary).await.unwrap();
        assert_eq!(raw, Contents::Binary(bytes.clone()), "{}", encoding);
    }

    let text = "plain text, ünïcode too";
    vault.write_file("/text", text, Encoding::Utf8).await.unwrap();
    assert_eq!(common::read(&vault, "/text").await, text);
}

#[tokio::test]
async fn test_binary_contents_ignore_text_encoding() {
    let (vault, _temp) = common::setup_test_env().await;
    vault
        .write_file("/raw", vec![1u8, 2, 3], Encoding::Hex)
        .await
        .unwrap();
    let read = vault.read_file("/raw", Encoding::Hex).await.unwrap();
    assert_eq!(read.as_text(), Some("010203"));
}

#[tokio::test]
async fn test_multi_block_file() {
    let (vault, _temp) = common::setup_test_env().await;

    // block size is 4 in tests
    let contents = "0123456789abcdefXYZ";
    common::write(&vault, "/big.txt", contents).await;
    assert_eq!(common::read(&vault, "/big.txt").await, contents);

    let stat = vault.stat("/big.txt").await.unwrap();
    let file = stat.as_file().unwrap();
    assert_eq!(file.size, contents.len() as u64);
    assert_eq!(file.blocks, 5);
    assert_eq!(file.downloaded, 5);
    assert_eq!(file.mime.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_empty_file() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/empty", "").await;

    assert_eq!(common::read(&vault, "/empty").await, "");
    let stat = vault.stat("/empty").await.unwrap();
    assert_eq!(stat.as_file().unwrap().blocks, 0);
    assert!(stat.as_file().unwrap().is_downloaded());
}

#[tokio::test]
async fn test_stat_kinds_and_versions() {
    let (vault, _temp) = common::setup_test_env().await;

    let v_file = common::write(&vault, "/docs/readme.md", "# hi").await;
    let file = vault.stat("/docs/readme.md").await.unwrap();
    assert!(file.is_file());
    assert_eq!(file.version(), v_file);

    // implied directory
    let dir = vault.stat("/docs").await.unwrap();
    assert!(dir.is_directory());
    assert_eq!(dir.version(), v_file);

    // trailing slash addresses the same directory
    assert_eq!(vault.stat("/docs/").await.unwrap(), dir);

    assert!(matches!(vault.stat("/").await.unwrap(), Stat::Directory(_)));
    assert!(matches!(
        vault.stat("/missing").await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_read_errors() {
    let (vault, _temp) = common::setup_test_env().await;
    vault.mkdir("/dir").await.unwrap();

    assert!(matches!(
        vault.read_file("/dir", Encoding::Utf8).await,
        Err(VaultError::NotAFile(_))
    ));
    assert!(matches!(
        vault.read_file("/nope", Encoding::Utf8).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_percent_encoded_paths() {
    let (vault, _temp) = common::setup_test_env().await;
    common::write(&vault, "/with%20space.txt", "x").await;
    assert_eq!(common::read(&vault, "/with space.txt").await, "x");
    assert!(vault
        .readdir("/")
        .await
        .unwrap()
        .contains(&"with space.txt".to_string()));
}
